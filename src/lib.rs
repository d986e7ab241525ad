//! Client-side engine for the JMAP protocol (RFC 8620 core, RFC 8621 mail)
//!
//! The engine covers three things:
//!
//! - **Session discovery**: fetch and parse the server's session object
//!   into an immutable [`Session`], with authentication picked automatically
//!   from the credential shape ([`AuthScheme`]).
//! - **Batched method calls**: build a [`Request`] of named calls, some of
//!   which consume earlier results via [`ResultReference`]s, send it in one
//!   round trip, and [`correlate`] the response back to call ids with
//!   per-call failure isolation.
//! - **Mailbox navigation**: turn the flat `Mailbox/get` list into a
//!   [`MailboxTree`] with paths, role lookup and recursive counts, tolerant
//!   of dangling parents and cycles.
//!
//! ```no_run
//! use jmap::{EmailQuery, JmapClient};
//!
//! # async fn run() -> Result<(), jmap::Error> {
//! let client = JmapClient::new("https://api.fastmail.com", "user@example.com", "fmu1-key")?;
//! let session = client.connect().await?;
//!
//! let tree = client.get_mailbox_tree(&session, None).await?;
//! if let Some(inbox) = tree.get_by_role(jmap::Role::Inbox) {
//!     println!("{}: {} unread", inbox.path, tree.unread_recursive(inbox.id()));
//! }
//!
//! let query = EmailQuery::new().in_mailbox("mb1").has_keyword("$flagged");
//! let ids = client.query_emails(&session, Some(&query), None, Some(20), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod mailbox;
pub mod permissions;
pub mod query;
pub mod request;
pub mod response;
pub mod session;

pub use auth::AuthScheme;
pub use client::JmapClient;
pub use error::{Error, TransportError};
pub use mailbox::{Mailbox, MailboxNode, MailboxTree, Role, TreeDiagnostic, TreeStats};
pub use permissions::PermissionReport;
pub use query::{Comparator, EmailQuery};
pub use request::{Arg, InvalidReferenceError, MethodCall, Request, ResultReference};
pub use response::{correlate, CallError, MethodError, MethodResponse, Response};
pub use session::{capability, Account, DiscoveryError, Session};
