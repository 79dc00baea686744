use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tracing::info;

use super::{GuildOrchestrator, Services};

/// Registro proceso-global de orquestadores: creación perezosa con semántica
/// atómica de insert-if-absent y eliminación explícita. Se construye en el
/// composition root y se inyecta en los handlers; nunca es estado ambiente.
pub struct OrchestratorRegistry {
    services: Services,
    orchestrators: DashMap<GuildId, Arc<GuildOrchestrator>>,
}

impl OrchestratorRegistry {
    pub fn new(services: Services) -> Arc<Self> {
        Arc::new(Self {
            services,
            orchestrators: DashMap::new(),
        })
    }

    /// Devuelve el orquestador del guild, creándolo si no existe
    pub fn get_or_create(self: &Arc<Self>, guild_id: GuildId) -> Arc<GuildOrchestrator> {
        self.orchestrators
            .entry(guild_id)
            .or_insert_with(|| {
                GuildOrchestrator::spawn(guild_id, &self.services, Arc::downgrade(self))
            })
            .clone()
    }

    /// Devuelve el orquestador sólo si ya existe
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildOrchestrator>> {
        self.orchestrators.get(&guild_id).map(|o| o.clone())
    }

    pub fn remove(&self, guild_id: GuildId) {
        if self.orchestrators.remove(&guild_id).is_some() {
            info!("🗑️ Orquestador eliminado para guild {}", guild_id);
        }
    }

    /// Salas activas, para los contadores del dashboard
    pub fn active_count(&self) -> usize {
        self.orchestrators.len()
    }
}
