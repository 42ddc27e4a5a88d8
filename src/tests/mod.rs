//! End-to-end tests driving the full HTTP surface against mocked upstreams.
