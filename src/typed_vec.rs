//! Index-typed vectors.
//!
//! Every arena in this crate (joints, lines, path infos, contours) is a plain `Vec` that can
//! only be indexed by its own index type, so a `LineIdx` can never be used to look up a joint.

/// Defines an index newtype and a vector that is indexed by it.
///
/// The index prints as `{prefix}_{n}` in debug output, which keeps traces of rings and sweep
/// lines short.
macro_rules! impl_typed_vec {
    ($(#[$attr:meta])* $vec_name:ident, $idx_name:ident, $dbg_prefix:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
        pub struct $idx_name(pub usize);

        impl std::fmt::Debug for $idx_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", $dbg_prefix, self.0)
            }
        }

        impl $idx_name {
            /// Shifts this index by `offset`, for merging one arena into the end of another.
            #[allow(dead_code)]
            pub(crate) fn offset(self, offset: usize) -> Self {
                $idx_name(self.0 + offset)
            }
        }

        /// A vector indexed by
        #[doc = concat!("[`", stringify!($idx_name), "`].")]
        #[derive(Clone, serde::Serialize)]
        pub struct $vec_name<T> {
            inner: Vec<T>,
        }

        #[allow(dead_code)]
        impl<T> $vec_name<T> {
            /// Creates a new vector with capacity for at least `cap` elements before reallocating.
            pub fn with_capacity(cap: usize) -> Self {
                Self {
                    inner: Vec::with_capacity(cap),
                }
            }

            /// Returns an iterator over all indices into this vector.
            pub fn indices(&self) -> impl Iterator<Item = $idx_name> {
                (0..self.inner.len()).map($idx_name)
            }

            /// The length of this vector.
            pub fn len(&self) -> usize {
                self.inner.len()
            }

            /// Are we empty?
            pub fn is_empty(&self) -> bool {
                self.inner.is_empty()
            }

            /// Adds a new element, returning its index.
            pub fn push(&mut self, elt: T) -> $idx_name {
                self.inner.push(elt);
                $idx_name(self.inner.len() - 1)
            }

            /// The index that the next pushed element will get.
            pub fn next_idx(&self) -> $idx_name {
                $idx_name(self.inner.len())
            }

            /// Returns an iterator over indices and elements.
            pub fn iter(&self) -> impl Iterator<Item = ($idx_name, &T)> + '_ {
                self.inner
                    .iter()
                    .enumerate()
                    .map(|(idx, t)| ($idx_name(idx), t))
            }

            /// Moves all the elements of `other` to the end of this vector.
            pub(crate) fn append(&mut self, other: &mut Self) {
                self.inner.append(&mut other.inner);
            }

            /// Transforms every element in place, consuming the vector.
            pub(crate) fn map<U>(self, f: impl FnMut(T) -> U) -> $vec_name<U> {
                $vec_name {
                    inner: self.inner.into_iter().map(f).collect(),
                }
            }
        }

        #[allow(dead_code)]
        impl<T: Clone> $vec_name<T> {
            /// Creates a new vector with `size` copies of `value`.
            pub fn filled(size: usize, value: T) -> Self {
                Self {
                    inner: vec![value; size],
                }
            }

            /// Grows this vector to `size` elements, filling with `value`.
            pub(crate) fn resize(&mut self, size: usize, value: T) {
                self.inner.resize(size, value);
            }
        }

        impl<T> Default for $vec_name<T> {
            fn default() -> Self {
                Self { inner: Vec::new() }
            }
        }

        impl<T> std::ops::Index<$idx_name> for $vec_name<T> {
            type Output = T;

            fn index(&self, index: $idx_name) -> &Self::Output {
                &self.inner[index.0]
            }
        }

        impl<T> std::ops::IndexMut<$idx_name> for $vec_name<T> {
            fn index_mut(&mut self, index: $idx_name) -> &mut T {
                &mut self.inner[index.0]
            }
        }

        impl<T: std::fmt::Debug> std::fmt::Debug for $vec_name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                struct Entry<'a, T> {
                    idx: $idx_name,
                    inner: &'a T,
                }

                impl<T: std::fmt::Debug> std::fmt::Debug for Entry<'_, T> {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "{idx:?}: {inner:?}", idx = self.idx, inner = self.inner,)
                    }
                }

                let mut list = f.debug_list();
                for (idx, inner) in self.iter() {
                    list.entry(&Entry { idx, inner });
                }
                list.finish()
            }
        }
    };
}
