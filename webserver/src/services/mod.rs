//! Service implementations
//!
//! Real implementations of the service traits for production use

pub mod supabase_ledger;

pub use supabase_ledger::SupabaseLedger;
