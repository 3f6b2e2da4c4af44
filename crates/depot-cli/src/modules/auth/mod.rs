mod actions;
pub(crate) mod args;
mod keychain;

pub(crate) use actions::{handle_login, handle_logout, handle_status};
pub(crate) use keychain::{delete_session_record, KeyringStorage};
#[cfg(test)]
pub(crate) use keychain::{
    clear_keyring_mock, lock_keyring_tests_async, lock_keyring_tests_sync, seed_keyring_mock,
};
