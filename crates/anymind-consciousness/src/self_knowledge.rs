//! Self-knowledge: what the assistant can say about itself
//!
//! When a message asks "who are you" or "what can you do", the status
//! report is appended to the system prompt so the answer reflects the
//! real provider table instead of whatever the model imagines.

use anymind_core::{AppConfig, IdentityConfig, Permissions, ProviderId};
use anymind_llm::ProviderStatus;
use anymind_router::QueryRouter;
use std::collections::BTreeMap;

const SELF_INQUIRY_CUES: &[&str] = &[
    "quién sos", "quien sos", "quién eres", "quien eres", "qué sos", "que sos", "qué podés",
    "que podes", "qué puedes", "tus capacidades", "qué ias", "que ias", "cuántas ias", "cuantas ias",
    "qué modelos", "who are you", "what are you", "what can you do", "your capabilities",
];

pub struct SelfKnowledge {
    identity: IdentityConfig,
    permissions: Permissions,
    version: String,
    specialties: BTreeMap<ProviderId, String>,
}

impl SelfKnowledge {
    pub fn new(config: &AppConfig, router: &QueryRouter) -> Self {
        Self {
            identity: config.identity.clone(),
            permissions: config.permissions.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            specialties: router
                .table()
                .iter()
                .map(|row| (row.provider.clone(), row.tag.clone()))
                .collect(),
        }
    }

    pub fn is_self_inquiry(text: &str) -> bool {
        let lowered = text.to_lowercase();
        SELF_INQUIRY_CUES.iter().any(|cue| lowered.contains(cue))
    }

    /// Permission lookup by short name.
    pub fn can(&self, capability: &str) -> bool {
        match capability {
            "execute_commands" => self.permissions.can_execute_commands,
            "modify_files" => self.permissions.can_modify_files,
            "self_update" => self.permissions.can_self_update,
            _ => false,
        }
    }

    /// One line: how many providers are live and which.
    pub fn short_summary(statuses: &[ProviderStatus]) -> String {
        let active: Vec<&str> = statuses
            .iter()
            .filter(|s| s.enabled && s.configured)
            .map(|s| s.id.as_str())
            .collect();
        if active.is_empty() {
            return "No hay IAs activas actualmente.".to_string();
        }
        format!("Tengo {} IAs activas: {}", active.len(), active.join(", "))
    }

    pub fn status_report(&self, statuses: &[ProviderStatus]) -> String {
        let mark = |b: bool| if b { "✓" } else { "✗" };
        let active: Vec<&ProviderStatus> = statuses.iter().filter(|s| s.enabled).collect();
        let inactive: Vec<&ProviderStatus> = statuses.iter().filter(|s| !s.enabled).collect();

        let mut out = String::from("=== AUTO-ANÁLISIS ===\n\n");
        out.push_str("IDENTIDAD:\n");
        out.push_str(&format!("   • Nombre: {}\n", self.identity.name));
        out.push_str(&format!("   • Apodo: {}\n", self.identity.nickname));
        out.push_str(&format!("   • Versión: {}\n\n", self.version));

        out.push_str("SISTEMA DE IAs:\n");
        out.push_str(&format!("   • IAs configuradas: {}\n", statuses.len()));
        out.push_str(&format!("   • IAs activas: {}\n", active.len()));
        if !active.is_empty() {
            out.push_str("\n   IAs ACTIVAS:\n");
            for status in &active {
                out.push_str(&format!("      • {}\n", status.id));
                out.push_str(&format!("        - Modelo: {}\n", status.model));
                out.push_str(&format!("        - Costo: {}\n", status.cost_tier));
                if let Some(tag) = self.specialties.get(&status.id) {
                    out.push_str(&format!("        - Especialidad: {}\n", tag));
                }
                out.push_str(&format!(
                    "        - API Key: {}\n",
                    if status.configured { "✓ Configurada" } else { "✗ Faltante" }
                ));
            }
        }
        if !inactive.is_empty() {
            out.push_str("\n   IAs DISPONIBLES (inactivas):\n");
            for status in &inactive {
                out.push_str(&format!("      • {}\n", status.id));
            }
        }

        out.push_str("\nCAPACIDADES:\n");
        out.push_str("   • Síntesis Multi-IA: ✓\n");
        out.push_str("   • Auto-Aprendizaje: ✓\n");
        out.push_str("   • Memoria Persistente: ✓\n");

        out.push_str("\nPERMISOS:\n");
        out.push_str(&format!("   • Ejecutar comandos: {}\n", mark(self.permissions.can_execute_commands)));
        out.push_str(&format!("   • Modificar archivos: {}\n", mark(self.permissions.can_modify_files)));
        out.push_str(&format!("   • Auto-actualización: {}\n", mark(self.permissions.can_self_update)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str, enabled: bool, configured: bool) -> ProviderStatus {
        ProviderStatus {
            id: ProviderId::new(id),
            enabled,
            configured,
            model: format!("{}-model", id),
            cost_tier: "free".into(),
        }
    }

    #[test]
    fn detects_self_questions() {
        assert!(SelfKnowledge::is_self_inquiry("Hola! ¿Quién sos?"));
        assert!(SelfKnowledge::is_self_inquiry("What can you do?"));
        assert!(SelfKnowledge::is_self_inquiry("¿Qué IAs usás?"));
        assert!(!SelfKnowledge::is_self_inquiry("¿Qué hora es?"));
    }

    #[test]
    fn report_lists_active_and_inactive() {
        let knowledge = SelfKnowledge::new(&AppConfig::default(), &QueryRouter::default());
        let report = knowledge.status_report(&[
            status("groq", true, true),
            status("google", true, false),
            status("cohere", false, false),
        ]);

        assert!(report.contains("Nombre: Any"));
        assert!(report.contains("IAs activas: 2"));
        assert!(report.contains("groq-model"));
        assert!(report.contains("Especialidad: síntesis_análisis"));
        assert!(report.contains("✗ Faltante"));
        let inactive = report.find("inactivas").unwrap();
        assert!(report[inactive..].contains("cohere"));
        assert!(report.contains("Ejecutar comandos: ✗"));
    }

    #[test]
    fn short_summary_counts_live_providers() {
        let statuses = [status("groq", true, true), status("google", true, false)];
        assert_eq!(SelfKnowledge::short_summary(&statuses), "Tengo 1 IAs activas: groq");
        assert!(SelfKnowledge::short_summary(&[]).starts_with("No hay"));
    }
}
