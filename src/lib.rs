//! # pgrest - lazy, typed PostgREST requests
//!
//! pgrest turns a declarative description of a table operation or stored
//! procedure call into a single HTTP request, and the HTTP response into a
//! uniform [`Response`]. Builders do nothing until they are awaited.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pgrest::{Client, Count};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct NewTodo {
//!     title: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct Todo {
//!     id: u64,
//!     title: String,
//!     done: bool,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pgrest::Error> {
//!     let client = Client::builder()
//!         .base_url("http://localhost:3000")?
//!         .schema("api")
//!         .build()?;
//!
//!     // Nothing is sent until `.await`.
//!     let open = client
//!         .from::<Todo>("todos")
//!         .select("id,title,done")
//!         .filter("done", "is", "false")
//!         .order("id", true)
//!         .count(Count::Exact);
//!
//!     let response = open.await?;
//!     println!("{} ({:?} open)", response.status, response.count());
//!
//!     let created = client
//!         .from::<Todo>("todos")
//!         .insert(&NewTodo { title: "write docs".to_string() })
//!         .await?;
//!     if let Some(error) = created.error() {
//!         eprintln!("{}: {}", created.status, error.message);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Results and errors
//!
//! A non-2xx answer is not an `Err`. It resolves to a [`Response`] whose
//! [`Outcome`] is [`Outcome::Failure`] with the server's [`PostgrestError`].
//! `Err(`[`Error`]`)` is reserved for exchanges that did not complete:
//! transport errors, unparsable bodies and invalid builder input.
//!
//! ## Headers
//!
//! When a builder is awaited the following headers are derived:
//!
//! - `Accept-Profile` (reads) or `Content-Profile` (writes) when a schema is set
//! - `Content-Type: application/json` for `POST`, `PATCH` and `DELETE`
//! - `Prefer` from [`count`](FilterBuilder::count),
//!   [`returning`](FilterBuilder::returning) and the chosen verb
//!
//! The response's `Content-Range` total becomes [`Response::count`] when a
//! count was requested.

mod client;
pub mod descriptor;
pub mod engine;
mod error;
pub mod prefer;
mod query;
mod response;

pub use client::{Client, ClientBuilder};
pub use descriptor::{BuildRequest, Method, RequestDescriptor};
pub use error::{Error, PostgrestError, Result};
pub use prefer::{Count, Returning};
pub use query::{FilterBuilder, QueryBuilder};
pub use response::{Outcome, Response};
