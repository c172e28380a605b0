// src/identity.rs
//
// Optional identity collaborator: maps an appearance embedding to a person
// kind (employee / frequent customer / new customer).
//
// The engine never depends on it. Without a provider, or for detections
// without an embedding, identity fields stay unset.

use crate::analysis::clustering::cosine_similarity;
use crate::error::MatchFailure;
use crate::types::PersonKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub enabled: bool,
    /// Minimum cosine similarity for a gallery match
    pub match_threshold: f32,
    /// Enroll unmatched embeddings as new customers
    pub register_unknown: bool,
    /// A match this long after the last sighting counts as a return visit
    pub revisit_gap_secs: f64,
    /// Identification attempts per track before giving up
    pub max_attempts: u32,
    /// Cap on self-registered customers; the least recently seen goes first
    pub max_registered: usize,
    /// Pre-enrolled identities (staff badges, loyalty members)
    pub gallery: Vec<EnrolledIdentity>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            match_threshold: 0.75,
            register_unknown: true,
            revisit_gap_secs: 1800.0,
            max_attempts: 5,
            max_registered: 5000,
            gallery: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledIdentity {
    pub person_id: String,
    pub kind: PersonKind,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityMatch {
    pub kind: PersonKind,
    pub person_id: Option<String>,
    pub confidence: f32,
    /// Distinct visits known for this identity, including the current one
    pub visits: u32,
}

pub trait IdentityProvider: Send {
    fn identify(&mut self, embedding: &[f32], timestamp: f64) -> Result<IdentityMatch, MatchFailure>;
}

struct GalleryEntry {
    person_id: String,
    kind: PersonKind,
    embedding: Vec<f32>,
    last_seen: Option<f64>,
    visits: u32,
    registered: bool,
}

/// In-memory gallery matched by cosine similarity.
pub struct EmbeddingGallery {
    entries: Vec<GalleryEntry>,
    threshold: f32,
    register_unknown: bool,
    revisit_gap_secs: f64,
    max_registered: usize,
    registered: usize,
    dim: Option<usize>,
    next_anonymous: u64,
}

impl EmbeddingGallery {
    pub fn new(config: &IdentityConfig) -> Self {
        let mut gallery = Self {
            entries: Vec::new(),
            threshold: config.match_threshold,
            register_unknown: config.register_unknown,
            revisit_gap_secs: config.revisit_gap_secs,
            max_registered: config.max_registered.max(1),
            registered: 0,
            dim: None,
            next_anonymous: 1,
        };
        for enrolled in &config.gallery {
            if let Err(e) = gallery.enroll(&enrolled.person_id, enrolled.kind, enrolled.embedding.clone()) {
                warn!("Skipping gallery entry {}: {}", enrolled.person_id, e);
            }
        }
        gallery
    }

    pub fn enroll(&mut self, person_id: &str, kind: PersonKind, embedding: Vec<f32>) -> Result<(), MatchFailure> {
        self.check_embedding(&embedding)?;
        self.dim.get_or_insert(embedding.len());
        self.entries.push(GalleryEntry {
            person_id: person_id.to_string(),
            kind,
            embedding,
            last_seen: None,
            visits: 0,
            registered: false,
        });
        Ok(())
    }

    /// Drop the least recently seen self-registered customer. Enrolled
    /// identities are never evicted.
    fn evict_stalest_registered(&mut self) {
        let stalest = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.registered)
            .min_by(|a, b| {
                let a = a.1.last_seen.unwrap_or(f64::NEG_INFINITY);
                let b = b.1.last_seen.unwrap_or(f64::NEG_INFINITY);
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);
        if let Some(idx) = stalest {
            let entry = self.entries.swap_remove(idx);
            self.registered -= 1;
            debug!("Gallery full, forgetting {}", entry.person_id);
        }
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<(), MatchFailure> {
        if embedding.is_empty() || embedding.iter().all(|v| *v == 0.0) || embedding.iter().any(|v| !v.is_finite()) {
            return Err(MatchFailure::EmptyEmbedding);
        }
        match self.dim {
            Some(expected) if expected != embedding.len() => Err(MatchFailure::DimensionMismatch {
                expected,
                got: embedding.len(),
            }),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdentityProvider for EmbeddingGallery {
    fn identify(&mut self, embedding: &[f32], timestamp: f64) -> Result<IdentityMatch, MatchFailure> {
        self.check_embedding(embedding)?;

        let best = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| cosine_similarity(&e.embedding, embedding).map(|s| (i, s)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((idx, similarity)) = best.filter(|(_, s)| *s >= self.threshold) {
            let gap = self.revisit_gap_secs;
            let entry = &mut self.entries[idx];
            let returning = entry.last_seen.is_some_and(|last| timestamp - last >= gap);
            if returning || entry.last_seen.is_none() {
                entry.visits += 1;
            }
            if returning && entry.kind == PersonKind::NewCustomer {
                info!("🔁 {} promoted to frequent customer", entry.person_id);
                entry.kind = PersonKind::FrequentCustomer;
            }
            entry.last_seen = Some(timestamp);
            debug!("Identity match {} ({:.3})", entry.person_id, similarity);
            return Ok(IdentityMatch {
                kind: entry.kind,
                person_id: Some(entry.person_id.clone()),
                confidence: similarity,
                visits: entry.visits,
            });
        }

        if self.register_unknown {
            let person_id = format!("C{}", self.next_anonymous);
            self.next_anonymous += 1;
            self.dim.get_or_insert(embedding.len());
            if self.registered >= self.max_registered {
                self.evict_stalest_registered();
            }
            self.entries.push(GalleryEntry {
                person_id: person_id.clone(),
                kind: PersonKind::NewCustomer,
                embedding: embedding.to_vec(),
                last_seen: Some(timestamp),
                visits: 1,
                registered: true,
            });
            self.registered += 1;
            debug!("Registered new customer {}", person_id);
            return Ok(IdentityMatch {
                kind: PersonKind::NewCustomer,
                person_id: Some(person_id),
                confidence: best.map(|(_, s)| 1.0 - s.max(0.0)).unwrap_or(1.0),
                visits: 1,
            });
        }

        match best {
            Some((_, s)) => Err(MatchFailure::BelowThreshold {
                best: s,
                threshold: self.threshold,
            }),
            None => Err(MatchFailure::EmptyGallery),
        }
    }
}

/// Provider for the configuration, or `None` when identity is disabled.
pub fn build_provider(config: &IdentityConfig) -> Option<Box<dyn IdentityProvider>> {
    if !config.enabled {
        return None;
    }
    let gallery = EmbeddingGallery::new(config);
    info!("✓ Identity gallery ready ({} enrolled)", gallery.len());
    Some(Box::new(gallery))
}
