use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

struct Frame {
    id: u64,
    type_id: TypeId,
    value: Box<dyn Any>,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Per-thread stack of scoped values, e.g. the user on whose behalf work is done.
///
/// Values of different types stack independently: [`ActingContext::current`] returns the
/// innermost value of the requested type.
pub struct ActingContext;

impl ActingContext {
    /// Make `value` current until the returned guard is dropped.
    #[must_use = "the value is popped as soon as the guard is dropped"]
    pub fn push<T: 'static>(value: T) -> ContextGuard<T> {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                id,
                type_id: TypeId::of::<T>(),
                value: Box::new(value),
            })
        });
        ContextGuard {
            id,
            _marker: PhantomData,
        }
    }

    /// Innermost value of type `T` on this thread.
    pub fn current<T: Clone + 'static>() -> Option<T> {
        Self::with_current(T::clone)
    }

    pub fn with_current<T: 'static, R>(f: impl FnOnce(&T) -> R) -> Option<R> {
        STACK.with(|stack| {
            let stack = stack.borrow();
            stack
                .iter()
                .rev()
                .find(|frame| frame.type_id == TypeId::of::<T>())
                .and_then(|frame| frame.value.downcast_ref::<T>())
                .map(f)
        })
    }

    pub fn depth() -> usize {
        STACK.with(|stack| stack.borrow().len())
    }
}

/// Pops its value when dropped, including during unwinding.
///
/// Bound to the pushing thread. Guards must be dropped in reverse push order.
pub struct ContextGuard<T> {
    id: u64,
    _marker: PhantomData<(*const (), T)>,
}

impl<T> Drop for ContextGuard<T> {
    fn drop(&mut self) {
        let in_order = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.iter().rposition(|frame| frame.id == self.id) {
                Some(index) => {
                    let in_order = index + 1 == stack.len();
                    stack.remove(index);
                    in_order
                }
                None => false,
            }
        });
        if !in_order {
            log::error!("acting context guard {} popped out of order", self.id);
            if !std::thread::panicking() {
                debug_assert!(in_order, "acting context guard popped out of order");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Actor(&'static str);

    #[test]
    fn nested_values_shadow_outer_ones() {
        assert_eq!(ActingContext::current::<Actor>(), None);
        let _outer = ActingContext::push(Actor("alice"));
        {
            let _inner = ActingContext::push(Actor("system"));
            assert_eq!(ActingContext::current::<Actor>(), Some(Actor("system")));
        }
        assert_eq!(ActingContext::current::<Actor>(), Some(Actor("alice")));
    }

    #[test]
    fn types_are_independent() {
        let _actor = ActingContext::push(Actor("alice"));
        let _request = ActingContext::push(42u64);
        assert_eq!(ActingContext::current::<Actor>(), Some(Actor("alice")));
        assert_eq!(ActingContext::current::<u64>(), Some(42));
        assert_eq!(ActingContext::with_current(|actor: &Actor| actor.0.len()), Some(5));
        assert_eq!(ActingContext::current::<String>(), None);
    }

    #[test]
    fn popped_on_early_return() {
        fn work() -> Result<(), String> {
            let _guard = ActingContext::push(Actor("alice"));
            let n: u32 = "not a number".parse().map_err(|_| "failed".to_string())?;
            assert_eq!(n, 0);
            Ok(())
        }

        assert!(work().is_err());
        assert_eq!(ActingContext::depth(), 0);
    }

    #[test]
    fn popped_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = ActingContext::push(Actor("alice"));
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(ActingContext::current::<Actor>(), None);
        assert_eq!(ActingContext::depth(), 0);
    }

    #[test]
    fn stacks_are_per_thread() {
        let _guard = ActingContext::push(Actor("alice"));
        let seen = std::thread::spawn(ActingContext::current::<Actor>)
            .join()
            .unwrap();
        assert_eq!(seen, None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "popped out of order")]
    fn out_of_order_pop_is_detected() {
        let outer = ActingContext::push(Actor("alice"));
        let _inner = ActingContext::push(Actor("system"));
        drop(outer);
    }
}
