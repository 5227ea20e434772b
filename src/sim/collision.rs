//! Fighter-fighter collision detection and response
//!
//! No mass or restitution model: any two Active fighters closer than the
//! contact radius receive an equal and opposite fixed-size velocity impulse
//! along the line between them.

use glam::Vec2;

use super::state::Fighter;
use crate::consts::{COLLISION_IMPULSE, CONTACT_RADIUS};

/// A detected contact between two fighters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: u32,
    pub b: u32,
    /// Unit vector from `a` towards `b`
    pub normal: Vec2,
    pub distance: f32,
}

/// Check whether two fighters are in contact
pub fn fighter_contact(a: &Fighter, b: &Fighter) -> Option<Contact> {
    if !a.is_active() || !b.is_active() {
        return None;
    }

    let delta = b.pos - a.pos;
    let distance = delta.length();
    if distance >= CONTACT_RADIUS {
        return None;
    }

    // Stacked fighters still need a separating direction
    let normal = if distance > f32::EPSILON {
        delta / distance
    } else {
        Vec2::X
    };

    Some(Contact {
        a: a.id,
        b: b.id,
        normal,
        distance,
    })
}

/// Resolve every unordered pair of Active fighters, returning the contacts found
pub fn resolve_collisions(fighters: &mut [Fighter]) -> Vec<Contact> {
    let mut contacts = Vec::new();

    for i in 0..fighters.len() {
        let (head, tail) = fighters.split_at_mut(i + 1);
        let first = &mut head[i];
        for second in tail.iter_mut() {
            if let Some(contact) = fighter_contact(first, second) {
                first.vel -= contact.normal * COLLISION_IMPULSE;
                second.vel += contact.normal * COLLISION_IMPULSE;
                contacts.push(contact);
            }
        }
    }

    contacts
}
