//! Integration tests driving the fork-rail binary against scratch repositories

mod helpers;
mod test_image;
mod test_interrupt;
mod test_package;
mod test_restore;
mod test_sync;
mod test_version;
