//! End-to-end scenarios over the public tree API.
//!
//! Each scenario builds a tree through `NestedSet`, runs one or more
//! structural operations, and checks both the resulting intervals and the
//! full invariant set.

#![cfg(test)]

mod helpers;
mod test_append_child;
mod test_copy_subtree;
mod test_create_root;
mod test_durability;
mod test_error_rollback;
mod test_insert_parent;
mod test_move_subtree;
mod test_remove;
mod test_traversal;
