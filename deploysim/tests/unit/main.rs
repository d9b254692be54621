//! Integration tests

mod test_lifecycle;
mod test_polling;
mod test_restart;
