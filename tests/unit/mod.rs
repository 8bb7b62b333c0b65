//! Component tests that do not need a running node
