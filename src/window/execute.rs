use super::{Window, WindowIterator};
use crate::tensor::{Coordinates, MAX_DIMS};

/// Call `action` once per coordinate of `window`, outermost axis first and
/// axis 0 fastest, advancing every iterator in lock-step after each position.
///
/// An empty window runs nothing.
pub fn execute_window_loop<F>(window: &Window, iterators: &[&WindowIterator<'_>], mut action: F)
where
    F: FnMut(&Coordinates),
{
    if window.is_empty() { return; }
    let mut id = Coordinates::default();
    loop_dim(MAX_DIMS - 1, window, &mut id, iterators, &mut action);
}

fn loop_dim<F>(dim: usize, window: &Window, id: &mut Coordinates, iterators: &[&WindowIterator<'_>], action: &mut F)
where
    F: FnMut(&Coordinates),
{
    let d = window[dim];
    let mut v = d.start();
    while v < d.end() {
        id[dim] = v;
        if dim == 0 {
            action(id);
        } else {
            loop_dim(dim - 1, window, id, iterators, action);
        }
        for it in iterators { it.increment(dim); }
        v += d.step();
    }
}
