//! Sandboxed, steppable JavaScript interpreter for embedding
//!
//! The engine consumes a pre-parsed ESTree-shaped AST (it never parses
//! program text), evaluates it against an isolated [`Realm`], and hands
//! control back to the host between operations: every evaluation is a task
//! the host drives one step at a time through a [`TaskIterator`], so a
//! misbehaving script can be paused, inspected, or aborted at any point.
//!
//! # Example
//!
//! ```
//! use sandjs::{JsValue, Realm};
//!
//! // 1 + 2 * 3, as produced by any ESTree-compatible parser.
//! let program: sandjs::ast::Program = serde_json::from_str(
//!     r#"{
//!         "body": [{
//!             "type": "ExpressionStatement",
//!             "expression": {
//!                 "type": "BinaryExpression",
//!                 "operator": "+",
//!                 "left": {"type": "Literal", "value": 1},
//!                 "right": {
//!                     "type": "BinaryExpression",
//!                     "operator": "*",
//!                     "left": {"type": "Literal", "value": 2},
//!                     "right": {"type": "Literal", "value": 3}
//!                 }
//!             }
//!         }]
//!     }"#,
//! )
//! .unwrap();
//!
//! let realm = Realm::new();
//! assert_eq!(realm.evaluate(&program).unwrap(), JsValue::Number(7.0));
//! ```
//!
//! Stepped evaluation under host control:
//!
//! ```
//! use sandjs::{Realm, TaskIterator};
//!
//! # let program: sandjs::ast::Program = serde_json::from_str(
//! #     r#"{"body": [{"type": "ExpressionStatement",
//! #         "expression": {"type": "Literal", "value": 1}}]}"#).unwrap();
//! let realm = Realm::new();
//! let mut steps = 0;
//! realm
//!     .evaluate_script(&program, &mut |task: &mut TaskIterator| {
//!         while !task.done() {
//!             steps += 1;
//!             if task.next().is_err() {
//!                 break;
//!             }
//!         }
//!     })
//!     .unwrap();
//! assert!(steps > 0);
//! ```

pub mod ast;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod intrinsics;
pub mod module;
pub mod realm;
pub mod task;
pub mod value;

pub use ast::{Program, SourceType, Span};
pub use error::EngineError;
pub use interpreter::frames::Operation;
pub use interpreter::Interpreter;
pub use module::{ModuleResolver, ResolvedModule};
pub use realm::{ModuleHandle, Realm, RealmOptions};
pub use task::{enqueue_microtask, Job, TaskIterator, TaskRunner, TaskStatus};
pub use value::{CheapClone, JsObjectRef, JsString, JsValue, PropertyKey};
