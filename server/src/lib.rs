//! # Territory Game Server Library
//!
//! Authoritative server for a real-time multiplayer grid-territory-capture
//! game. The server owns the canonical 50x50 grid, the player roster and the
//! per-player move economy; clients render and send intents, the server
//! decides.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Grid State
//! All grid mutation funnels through one [`game::GameState`] instance inside
//! a single event loop: connects, moves, regen ticks and removals each run
//! to completion before the next event, so no operation ever observes a
//! half-applied mutation.
//!
//! ### Move Economy
//! Every player holds a bounded move balance that regenerates one move per
//! fixed interval. Regen is granular but monotonic: fractional progress
//! carries over between ticks, and the balance saturates at the cap.
//!
//! ### Enclosure Capture
//! After every painted cell the capture engine flood-fills from the grid
//! border and converts any region the acting team has fully walled off.
//! Capture forces a full grid resync to all clients; ordinary paints ship as
//! single-cell deltas.
//!
//! ### Session Lifecycle
//! Connections authenticate with a bearer token verified at the boundary
//! (the server only consumes the resulting identity triple). Disconnected
//! players linger for a short grace period and reconnects rebind the same
//! player to a fresh connection id with position, team and balance intact.
//!
//! ## Module Organization
//!
//! - [`auth`] — identity boundary: the token verifier seam
//! - [`game`] — canonical grid, registry, occupancy and move validation
//! - [`capture`] — border flood-fill enclosure detection
//! - [`chat`] — bounded global and per-team message buffers
//! - [`client_manager`] — session registry and silent-disconnect detection
//! - [`network`] — UDP gateway, main select loop and regen scheduler

pub mod auth;
pub mod capture;
pub mod chat;
pub mod client_manager;
pub mod game;
pub mod network;
pub mod utils;
