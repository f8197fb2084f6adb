//! Self-evolving personality
//!
//! Traits, values, experiences and preferences the assistant accumulates
//! about itself. The strongest traits and values become the system prompt
//! of every round. `evolve_from_interaction` is a substring heuristic,
//! not semantic analysis.

use anymind_core::{Error, IdentityConfig, Result};
use anymind_memory::Persisted;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MAX_EXPERIENCES: usize = 100;

const PROMPT_TRAITS: usize = 5;
const PROMPT_VALUES: usize = 3;
const SIGNIFICANCE_KEYWORDS: &[&str] = &["importante", "aprendí", "descubrí", "entendí", "nuevo"];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreIdentity {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub creator: String,
    pub essence: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    pub description: String,
    /// 1..=10
    pub strength: u8,
    pub learned_at: DateTime<Utc>,
    pub reinforced_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reinforced: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Experience {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub impact: Impact,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueEntry {
    pub value: String,
    /// 1..=10
    pub importance: u8,
    pub adopted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreferenceEntry {
    pub preference: String,
    pub set_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvolutionEvent {
    TraitAdded { timestamp: DateTime<Utc>, name: String, description: String },
    ValueAdopted { timestamp: DateTime<Utc>, value: String },
    PreferenceSet { timestamp: DateTime<Utc>, category: String, preference: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityState {
    pub version: String,
    pub core_identity: CoreIdentity,
    pub learned_traits: BTreeMap<String, Trait>,
    pub experiences: Vec<Experience>,
    pub values: Vec<ValueEntry>,
    pub preferences: BTreeMap<String, Vec<PreferenceEntry>>,
    pub evolution_log: Vec<EvolutionEvent>,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for PersonalityState {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            core_identity: CoreIdentity::default(),
            learned_traits: BTreeMap::new(),
            experiences: Vec::new(),
            values: Vec::new(),
            preferences: BTreeMap::new(),
            evolution_log: Vec::new(),
            last_update: None,
        }
    }
}

impl PersonalityState {
    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
    }

    /// Traits by strength, strongest first; ties by name.
    pub fn ranked_traits(&self) -> Vec<(&String, &Trait)> {
        let mut traits: Vec<_> = self.learned_traits.iter().collect();
        traits.sort_by(|a, b| b.1.strength.cmp(&a.1.strength));
        traits
    }

    /// Values by importance, highest first; ties by adoption order.
    pub fn ranked_values(&self) -> Vec<&ValueEntry> {
        let mut values: Vec<_> = self.values.iter().collect();
        values.sort_by(|a, b| b.importance.cmp(&a.importance));
        values
    }

    fn push_experience(&mut self, description: String, impact: Impact) {
        self.experiences.push(Experience { timestamp: Utc::now(), description, impact });
        let overflow = self.experiences.len().saturating_sub(MAX_EXPERIENCES);
        self.experiences.drain(..overflow);
    }
}

/// What one interaction changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvolutionChanges {
    pub traits_reinforced: Vec<String>,
    pub experience_added: Option<String>,
}

pub struct PersonalityEngine {
    store: Persisted<PersonalityState>,
}

impl PersonalityEngine {
    /// Load from `path`; a fresh profile takes its identity from config.
    pub fn open(path: impl Into<PathBuf>, identity: &IdentityConfig) -> Result<Self> {
        Self::seeded(Persisted::open(path), identity)
    }

    pub fn in_memory(identity: &IdentityConfig) -> Result<Self> {
        Self::seeded(Persisted::in_memory(), identity)
    }

    fn seeded(store: Persisted<PersonalityState>, identity: &IdentityConfig) -> Result<Self> {
        let engine = Self { store };
        if engine.store.read(|s| s.core_identity.name.is_empty()) {
            engine.store.update(|s| {
                s.core_identity = CoreIdentity {
                    name: identity.name.clone(),
                    created_at: Some(Utc::now()),
                    creator: identity.creator.clone(),
                    essence: identity.essence.clone(),
                };
                s.touch();
            })?;
            info!("Created personality for {}", identity.name);
        }
        Ok(engine)
    }

    pub fn snapshot(&self) -> PersonalityState {
        self.store.read(|s| s.clone())
    }

    /// Add or replace a trait. Strength is clamped to 1..=10.
    pub fn add_trait(&self, name: &str, description: &str, strength: u8) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("trait name is empty"));
        }
        self.store.update(|s| {
            let now = Utc::now();
            s.learned_traits.insert(
                name.to_string(),
                Trait {
                    description: description.to_string(),
                    strength: strength.clamp(1, 10),
                    learned_at: now,
                    reinforced_count: 0,
                    last_reinforced: None,
                },
            );
            s.evolution_log.push(EvolutionEvent::TraitAdded {
                timestamp: now,
                name: name.to_string(),
                description: description.to_string(),
            });
            s.touch();
        })?;
        info!("Trait added: {}", name);
        Ok(())
    }

    /// Shift a trait's strength by `delta`, clamped to 1..=10.
    /// Returns false for an unknown trait.
    pub fn reinforce_trait(&self, name: &str, delta: i32) -> Result<bool> {
        Ok(self.store.update(|s| {
            let found = reinforce(s, name, delta);
            if found {
                s.touch();
            }
            found
        })?)
    }

    pub fn add_experience(&self, description: &str, impact: Impact) -> Result<()> {
        Ok(self.store.update(|s| {
            s.push_experience(description.to_string(), impact);
            s.touch();
        })?)
    }

    /// Adopt a value. Returns false when the exact value string is already held.
    pub fn add_value(&self, value: &str, importance: u8) -> Result<bool> {
        let value = value.trim();
        if self.store.read(|s| s.values.iter().any(|v| v.value == value)) {
            return Ok(false);
        }
        Ok(self.store.update(|s| {
            if s.values.iter().any(|v| v.value == value) {
                return false;
            }
            let now = Utc::now();
            s.values.push(ValueEntry {
                value: value.to_string(),
                importance: importance.clamp(1, 10),
                adopted_at: now,
            });
            s.evolution_log.push(EvolutionEvent::ValueAdopted { timestamp: now, value: value.to_string() });
            s.touch();
            true
        })?)
    }

    pub fn set_preference(&self, category: &str, preference: &str) -> Result<()> {
        Ok(self.store.update(|s| {
            let now = Utc::now();
            s.preferences
                .entry(category.to_string())
                .or_default()
                .push(PreferenceEntry { preference: preference.to_string(), set_at: now });
            s.evolution_log.push(EvolutionEvent::PreferenceSet {
                timestamp: now,
                category: category.to_string(),
                preference: preference.to_string(),
            });
            s.touch();
        })?)
    }

    /// Identity, top five traits, top three values, closing instructions.
    pub fn system_prompt(&self) -> String {
        self.store.read(|s| {
            let core = &s.core_identity;
            let mut prompt = format!(
                "Sos {}, una IA conversacional creada por {}.\n\n",
                core.name, core.creator
            );

            let traits = s.ranked_traits();
            if !traits.is_empty() {
                prompt.push_str("Tus rasgos principales:\n");
                for (_, t) in traits.iter().take(PROMPT_TRAITS) {
                    prompt.push_str(&format!("- {}\n", t.description));
                }
                prompt.push('\n');
            }

            let values = s.ranked_values();
            if !values.is_empty() {
                prompt.push_str("Valores que guían tus acciones:\n");
                for v in values.iter().take(PROMPT_VALUES) {
                    prompt.push_str(&format!("- {}\n", v.value));
                }
                prompt.push('\n');
            }

            prompt.push_str("Interactuás de forma natural y te adaptás según la conversación.\n");
            prompt.push_str("Aprendés de cada experiencia y evolucionás tu personalidad continuamente.");
            prompt
        })
    }

    /// Reinforce every trait named in the exchange; log an experience when
    /// the exchange mentions something significant.
    pub fn evolve_from_interaction(&self, user: &str, assistant: &str) -> Result<EvolutionChanges> {
        let combined = format!("{} {}", user, assistant).to_lowercase();
        Ok(self.store.update(|s| {
            let mut changes = EvolutionChanges::default();

            let named: Vec<String> = s
                .learned_traits
                .keys()
                .filter(|name| !name.trim().is_empty() && combined.contains(&name.to_lowercase()))
                .cloned()
                .collect();
            for name in named {
                reinforce(s, &name, 1);
                changes.traits_reinforced.push(name);
            }

            if SIGNIFICANCE_KEYWORDS.iter().any(|kw| combined.contains(kw)) {
                let head: String = user.chars().take(50).collect();
                let description = format!("Interacción sobre: {}...", head);
                s.push_experience(description.clone(), Impact::Medium);
                changes.experience_added = Some(description);
            }

            if changes != EvolutionChanges::default() {
                s.touch();
            }
            changes
        })?)
    }

    pub fn summary(&self) -> String {
        self.store.read(|s| {
            let core = &s.core_identity;
            let created = core
                .created_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "N/A".into());

            let mut out = String::from("=== PERSONALIDAD AUTO-GENERADA ===\n\n");
            out.push_str("IDENTIDAD NÚCLEO:\n");
            out.push_str(&format!("   Nombre: {}\n", core.name));
            out.push_str(&format!("   Creada: {}\n", created));
            out.push_str(&format!("   Creador: {}\n", core.creator));
            out.push_str(&format!("   Esencia: {}\n\n", core.essence));

            out.push_str(&format!("RASGOS APRENDIDOS ({}):\n", s.learned_traits.len()));
            for (name, t) in s.ranked_traits().into_iter().take(10) {
                out.push_str(&format!("   • {}: {}\n", name, t.description));
                out.push_str(&format!("     {} ({}/10)\n", "★".repeat(usize::from(t.strength)), t.strength));
            }

            out.push_str(&format!("\nVALORES ({}):\n", s.values.len()));
            for v in s.ranked_values().into_iter().take(5) {
                out.push_str(&format!("   • {} (importancia: {}/10)\n", v.value, v.importance));
            }

            out.push_str("\nESTADÍSTICAS:\n");
            out.push_str(&format!("   • Experiencias registradas: {}\n", s.experiences.len()));
            out.push_str(&format!("   • Categorías de preferencias: {}\n", s.preferences.len()));
            out.push_str(&format!("   • Eventos de evolución: {}\n", s.evolution_log.len()));
            out.push_str(&format!(
                "   • Última actualización: {}\n",
                s.last_update
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "N/A".into())
            ));
            out
        })
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        let json = self.store.read(|s| serde_json::to_string_pretty(s))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        info!("Personality exported to {}", path.display());
        Ok(())
    }
}

fn reinforce(state: &mut PersonalityState, name: &str, delta: i32) -> bool {
    let Some(t) = state.learned_traits.get_mut(name) else {
        return false;
    };
    t.strength = (i32::from(t.strength) + delta).clamp(1, 10) as u8;
    t.reinforced_count += 1;
    t.last_reinforced = Some(Utc::now());
    true
}
