//! tfaws Core
//!
//! Resource model, schemas and the helpers shared by every AWS resource:
//! ARN parsing, composite IDs, status waiters, retries, keyed locks and tags.

pub mod arn;
pub mod id;
pub mod mutex;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod tags;
pub mod waiter;
