//! Invite codes for the admin flow. Redemption happens upstream of this
//! client and is out of scope here.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub code: String,
    pub created_at: String,
    pub created_by: String,
    pub used_at: Option<String>,
    pub used_by: Option<String>,
}

impl Invite {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some() || self.used_by.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub code: String,
    pub created_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteStats {
    pub total: usize,
    pub unused: usize,
    pub used: usize,
}

pub fn invite_stats(invites: &[Invite]) -> InviteStats {
    let used = invites.iter().filter(|i| i.is_used()).count();
    InviteStats {
        total: invites.len(),
        unused: invites.len() - used,
        used,
    }
}

/// Random lowercase alphanumeric invite code.
pub fn generate_code(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
