//! Routing and policy layer.
//!
//! Decides, per asset and build mode, which stages run, where output goes,
//! and how the module graph splits into chunks. Nothing here touches the
//! file system or runs an engine.
//!
//! # Architecture
//!
//! ```text
//! path ──classify──> AssetKind ──compose(kind, mode)──> TransformChain
//!                        │                                   │
//!                        └──rule_for(kind, mode)──> OutputRule
//!                                                            │
//!                                       RoutingTable <───────┘
//!
//! ModuleGraph ──plan(graph, mode)──> ChunkPlan
//! ```
//!
//! | Module     | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `stage`    | Stage names and typed options                    |
//! | `compose`  | Chain composer and rule table                    |
//! | `naming`   | Output namer, filename templates, inlining       |
//! | `parallel` | Pooled vs inline execution, worker pool          |
//! | `chunk`    | Module graph and chunk planner                   |
//! | `table`    | Routing table over discovered assets             |

pub mod chunk;
pub mod compose;
pub mod naming;
pub mod parallel;
pub mod stage;
pub mod table;

pub use chunk::{Chunk, ChunkKind, ChunkPlan, ChunkPlanner, ModuleGraph, ModuleId};
pub use compose::{ChainComposer, Terminal};
pub use naming::{ChunkRole, Emission, OutputNamer, OutputRule};
pub use parallel::WorkerPool;
pub use stage::{StageName, StageOptions, TransformStage};
pub use table::{Route, RoutingTable};
