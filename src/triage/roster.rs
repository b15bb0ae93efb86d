use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::types::Availability;
use crate::error::{AppError, AppResult};
use crate::storage::Category;

/// An IT agent that tickets can be routed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Display name.
    pub name: String,
    /// Categories the agent handles.
    pub skills: Vec<Category>,
    /// Narrower areas of expertise, free text.
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Experience summary.
    #[serde(default)]
    pub experience: String,
    /// Current availability.
    #[serde(default)]
    pub availability: Availability,
}

impl Agent {
    fn builtin(
        name: &str,
        skills: &[Category],
        specialties: &[&str],
        experience: &str,
        availability: Availability,
    ) -> Self {
        Self {
            name: name.to_string(),
            skills: skills.to_vec(),
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
            experience: experience.to_string(),
            availability,
        }
    }

    /// Whether the agent lists the category among their skills.
    pub fn handles(&self, category: Category) -> bool {
        self.skills.contains(&category)
    }
}

/// Result of routing a category to an agent.
#[derive(Debug, Clone, Copy)]
pub struct Routing<'a> {
    pub agent: &'a Agent,
    /// The agent lists the category among their skills.
    pub skill_match: bool,
}

/// Non-empty, ordered set of agents.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRoster {
    agents: Vec<Agent>,
}

impl AgentRoster {
    /// Build a roster; an empty agent list is rejected.
    pub fn new(agents: Vec<Agent>) -> AppResult<Self> {
        if agents.is_empty() {
            return Err(AppError::Config {
                message: "Agent roster must contain at least one agent".to_string(),
            });
        }
        Ok(Self { agents })
    }

    /// Load a roster from a JSON array of agents.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("Failed to read agent roster {}: {}", path.display(), e),
        })?;
        let agents: Vec<Agent> = serde_json::from_str(&raw).map_err(|e| AppError::Config {
            message: format!("Invalid agent roster {}: {}", path.display(), e),
        })?;

        let roster = Self::new(agents)?;
        info!(
            path = %path.display(),
            agents = roster.agents.len(),
            "Loaded agent roster"
        );
        Ok(roster)
    }

    /// All agents in roster order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Pick the agent for a category.
    ///
    /// Agents with the skill come first, available ones before the rest,
    /// then roster order. When nobody has the skill the first available
    /// agent (or simply the first agent) is returned without a skill match.
    pub fn best_for(&self, category: Category) -> Option<Routing<'_>> {
        let skilled = || self.agents.iter().filter(|a| a.handles(category));

        if let Some(agent) = skilled()
            .find(|a| a.availability == Availability::Available)
            .or_else(|| skilled().next())
        {
            return Some(Routing {
                agent,
                skill_match: true,
            });
        }

        self.agents
            .iter()
            .find(|a| a.availability == Availability::Available)
            .or_else(|| self.agents.first())
            .map(|agent| Routing {
                agent,
                skill_match: false,
            })
    }

    /// One line per agent, for prompts.
    pub fn summary(&self) -> String {
        self.agents
            .iter()
            .map(|a| {
                let skills: Vec<&str> = a.skills.iter().map(|c| c.as_str()).collect();
                format!(
                    "- {}: skills [{}]; specialties [{}]; experience: {}; availability: {}",
                    a.name,
                    skills.join(", "),
                    a.specialties.join(", "),
                    if a.experience.is_empty() { "n/a" } else { a.experience.as_str() },
                    a.availability
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for AgentRoster {
    fn default() -> Self {
        use Availability::{Available, Busy};
        use Category::*;

        Self {
            agents: vec![
                Agent::builtin(
                    "Alice Johnson",
                    &[Email, Software, Other],
                    &["Microsoft Office", "Outlook", "Windows"],
                    "5 years",
                    Available,
                ),
                Agent::builtin(
                    "Bob Smith",
                    &[Network, Access, Hardware],
                    &["VPN", "WiFi", "Active Directory"],
                    "7 years",
                    Available,
                ),
                Agent::builtin(
                    "Carol Williams",
                    &[Hardware, Software, Other],
                    &["Laptops", "Printers", "Peripherals"],
                    "4 years",
                    Busy,
                ),
                Agent::builtin(
                    "Dave Brown",
                    &[Security, Access, Network, Software],
                    &["Security", "Identity management", "Firewalls"],
                    "8 years",
                    Available,
                ),
                Agent::builtin(
                    "Eva Davis",
                    &[Network, Hardware, Other],
                    &["Infrastructure", "Servers", "Monitoring"],
                    "6 years",
                    Available,
                ),
            ],
        }
    }
}
