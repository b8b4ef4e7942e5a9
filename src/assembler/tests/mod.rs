//! Tests for group assembly, point deduplication and commit
