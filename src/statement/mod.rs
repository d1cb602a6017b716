//! Statement and Result Adapter Logic
//!
//! The pieces the scripting-side database functions sit on: a [`Link`] per
//! connection, the [`LinkPool`] for persistent connections, and
//! [`FieldInfo`] for result column descriptions.
//!
//! # Module Organization
//! - [`session`] - The synchronous session capability engines implement
//! - [`classify`] - Leading-keyword classification of executed SQL
//! - [`link`] - Remapping, binding and cache upkeep per connection
//! - [`field`] - `mysqli_fetch_field`-shaped column descriptions
//! - [`pool`] - Persistent links keyed by engine, URL and user

pub mod classify;
pub mod field;
pub mod link;
pub mod pool;
pub mod session;

pub use classify::{classify, StatementKind};
pub use field::FieldInfo;
pub use link::{Link, PreparedStatement};
pub use pool::{LinkKey, LinkPool, SharedLink};
pub use session::{EngineSession, ExecOutcome, ResultColumn, SqlSession, StatementHandle};
