//! Loan application intake, officer decisions, and the event announcements
//! that follow every committed mutation.

pub mod applications;
pub mod events;
