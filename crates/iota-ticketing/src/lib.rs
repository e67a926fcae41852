//! Ticketing-system client for the Iota bridge.
//!
//! Wraps the external incident API behind a blocking REST client with typed
//! outcomes for every non-success path, plus the closed attachment file-type
//! mapping used when uploading files to a ticket.

pub mod attachment_content;
pub mod ticketing_client;

pub use attachment_content::{file_name_stem, AttachmentFileType};
pub use ticketing_client::{
    title_case, AttachmentPostOutcome, TicketCreateOutcome, TicketUpdateOutcome, TicketingClient,
    RESOLVED_STATE_WIRE_VALUE,
};
