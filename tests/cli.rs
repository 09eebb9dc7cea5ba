//! CLI integration tests.

mod support;

#[path = "cli/init.rs"]
mod init;
#[path = "cli/rbac.rs"]
mod rbac;
#[path = "cli/secrets.rs"]
mod secrets;
#[path = "cli/sync.rs"]
mod sync;
#[path = "cli/doctor.rs"]
mod doctor;
#[path = "cli/env.rs"]
mod env;
