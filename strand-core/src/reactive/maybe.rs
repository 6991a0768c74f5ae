//! Values that may or may not be reactive.
//!
//! APIs that accept "a value or something that produces one" take a
//! [`MaybeSignal`]. Reading it resolves whichever variant it holds, tracking
//! dependencies the same way a direct read would.

use std::rc::Rc;

use super::memo::Memo;
use super::signal::Signal;

/// A plain value, a signal, a memo, or a getter closure.
pub enum MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    Value(T),
    Signal(Signal<T>),
    Memo(Memo<T>),
    Getter(Rc<dyn Fn() -> T>),
}

impl<T> MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Wrap a getter closure.
    pub fn getter(f: impl Fn() -> T + 'static) -> Self {
        MaybeSignal::Getter(Rc::new(f))
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, MaybeSignal::Signal(_))
    }

    pub fn is_memo(&self) -> bool {
        matches!(self, MaybeSignal::Memo(_))
    }

    /// Whether reading this can create a dependency.
    pub fn is_reactive(&self) -> bool {
        !matches!(self, MaybeSignal::Value(_))
    }

    /// Resolve the current value, whatever the variant.
    pub fn to_value(&self) -> T {
        match self {
            MaybeSignal::Value(value) => value.clone(),
            MaybeSignal::Signal(signal) => signal.get(),
            MaybeSignal::Memo(memo) => memo.get(),
            MaybeSignal::Getter(getter) => getter(),
        }
    }

    /// Read a signal into a plain value. Other variants pass through.
    pub fn un_signal(self) -> Self {
        match self {
            MaybeSignal::Signal(signal) => MaybeSignal::Value(signal.get()),
            other => other,
        }
    }
}

impl<T> Clone for MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        match self {
            MaybeSignal::Value(value) => MaybeSignal::Value(value.clone()),
            MaybeSignal::Signal(signal) => MaybeSignal::Signal(signal.clone()),
            MaybeSignal::Memo(memo) => MaybeSignal::Memo(memo.clone()),
            MaybeSignal::Getter(getter) => MaybeSignal::Getter(Rc::clone(getter)),
        }
    }
}

impl<T> std::fmt::Debug for MaybeSignal<T>
where
    T: Clone + PartialEq + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeSignal::Value(value) => f.debug_tuple("Value").field(value).finish(),
            MaybeSignal::Signal(signal) => f.debug_tuple("Signal").field(signal).finish(),
            MaybeSignal::Memo(memo) => f.debug_tuple("Memo").field(memo).finish(),
            MaybeSignal::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

impl<T> From<T> for MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn from(value: T) -> Self {
        MaybeSignal::Value(value)
    }
}

impl<T> From<Signal<T>> for MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        MaybeSignal::Signal(signal)
    }
}

impl<T> From<Memo<T>> for MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn from(memo: Memo<T>) -> Self {
        MaybeSignal::Memo(memo)
    }
}

pub fn is_signal<T>(value: &MaybeSignal<T>) -> bool
where
    T: Clone + PartialEq + 'static,
{
    value.is_signal()
}

pub fn is_memo<T>(value: &MaybeSignal<T>) -> bool
where
    T: Clone + PartialEq + 'static,
{
    value.is_memo()
}

/// Resolve any variant to its current value.
pub fn to_value<T>(value: &MaybeSignal<T>) -> T
where
    T: Clone + PartialEq + 'static,
{
    value.to_value()
}

/// Read a signal into a plain value; anything else passes through.
pub fn un_signal<T>(value: impl Into<MaybeSignal<T>>) -> MaybeSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    value.into().un_signal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Runtime};
    use std::cell::Cell;

    #[test]
    fn predicates_follow_variant() {
        let rt = Runtime::new();
        let signal = MaybeSignal::<i32>::from(Signal::new_in(&rt, 1));
        let memo = MaybeSignal::<i32>::from(Memo::new_in(&rt, || 2));
        let plain = MaybeSignal::from(3);

        assert!(signal.is_signal() && !signal.is_memo());
        assert!(memo.is_memo() && !memo.is_signal());
        assert!(!plain.is_reactive());
        assert!(is_signal(&signal));
        assert!(is_memo(&memo));
    }

    #[test]
    fn to_value_resolves_every_variant() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 10);
        let doubled = {
            let source = source.clone();
            Memo::new_in(&rt, move || source.get() * 2)
        };
        let tripled = {
            let source = source.clone();
            MaybeSignal::getter(move || source.get() * 3)
        };

        assert_eq!(to_value(&MaybeSignal::from(4)), 4);
        assert_eq!(to_value(&MaybeSignal::<i32>::from(source.clone())), 10);
        assert_eq!(to_value(&MaybeSignal::<i32>::from(doubled)), 20);
        assert_eq!(tripled.to_value(), 30);
    }

    #[test]
    fn un_signal_reads_only_signals() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, "a");

        let read: MaybeSignal<&str> = un_signal(source.clone());
        assert!(matches!(read, MaybeSignal::Value("a")));

        let plain: MaybeSignal<&str> = un_signal("b");
        assert!(matches!(plain, MaybeSignal::Value("b")));

        let memo = MaybeSignal::<&str>::from(Memo::new_in(&rt, || "c")).un_signal();
        assert!(memo.is_memo());
    }

    #[test]
    fn reading_inside_effect_tracks() {
        let rt = Runtime::new();
        let source = Signal::new_in(&rt, 1);
        let input = MaybeSignal::<i32>::from(source.clone());
        let seen = Rc::new(Cell::new(0));

        let effect = {
            let seen = seen.clone();
            Effect::new_in(&rt, move || seen.set(input.to_value()))
        };
        source.set(9);
        assert_eq!(seen.get(), 9);
        effect.stop();
    }
}
