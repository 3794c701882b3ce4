// Shared plumbing for the statline workspace: loosely-typed rows, the
// query/schema collaborator traits, column resolution, configuration, and a
// local SQLite analytic store.

pub mod config;
pub mod schema;
pub mod source;
pub mod sqlite;
pub mod value;
