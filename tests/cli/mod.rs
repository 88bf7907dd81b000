//! CLI command integration tests
//!
//! These run the `prov-index` binary against temporary trees and check its
//! JSON output and exit codes.
