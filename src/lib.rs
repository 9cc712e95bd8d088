// Module layout (Clean Architecture style)
// - bootstrap: configuration and adapter wiring
// - infrastructure: libgit2 / GitHub API / credential adapters
// - application: sync protocol, ports and use cases
// - domain: refs and commit identifiers

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
