/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Phase commands, queries and storage reconciliation.
pub mod phase_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Per-connection SSE streams.
pub mod sse_service;
/// Background persistence of published snapshots.
pub mod snapshot_writer;
/// Storage connection supervisor and degraded mode.
pub mod storage_supervisor;
