//! End-to-end Basic authentication through the middleware
