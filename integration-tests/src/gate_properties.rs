//! Behavioral contract of the gate, exercised through a real router
