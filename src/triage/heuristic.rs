//! Deterministic keyword classifier.
//!
//! Categorization is driven by [`CATEGORY_RULES`], an ordered table of
//! keywords, self-fix suggestions and default priorities. Matching is done on
//! whole tokens of the lowercased title and description, so `"password"`
//! never matches a `"word"` keyword and phrases match whole token runs.
//! Nothing here performs I/O or reads the clock.

use std::collections::BTreeSet;

use super::roster::AgentRoster;
use super::types::{
    Availability, Score, SimilarTicket, SuggestedProcessor, TicketAnalysis, MAX_INSIGHTS,
    MAX_SELF_FIX_SUGGESTIONS, MAX_SIMILAR_TICKETS,
};
use crate::storage::{Category, Priority, Ticket};

/// One row of the category table.
#[derive(Debug, PartialEq)]
pub struct CategoryRule {
    pub category: Category,
    /// Lowercase keywords or space-separated phrases.
    pub keywords: &'static [&'static str],
    pub suggestions: &'static [&'static str],
    pub default_priority: Priority,
}

/// Category rules in tie-break order: on equal match counts the earlier row wins.
pub static CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::Security,
        keywords: &[
            "phishing",
            "malware",
            "virus",
            "ransomware",
            "suspicious",
            "spam",
            "hacked",
            "breach",
            "compromised",
            "security",
        ],
        suggestions: &[
            "Do not click links or open attachments in the suspicious message",
            "Disconnect the affected device from the network",
            "Run a full antivirus scan",
            "Change your password from a different, trusted device",
            "Report the message with the Report Phishing button",
        ],
        default_priority: Priority::High,
    },
    CategoryRule {
        category: Category::Network,
        keywords: &[
            "vpn",
            "network",
            "wifi",
            "wi-fi",
            "internet",
            "ethernet",
            "dns",
            "router",
            "connectivity",
            "bandwidth",
        ],
        suggestions: &[
            "Check network cable connections",
            "Restart your router and modem",
            "Disconnect and reconnect the VPN client",
            "Run the Windows Network Troubleshooter",
            "Check whether other devices can connect to the network",
        ],
        default_priority: Priority::Medium,
    },
    CategoryRule {
        category: Category::Access,
        keywords: &[
            "password",
            "login",
            "log in",
            "locked out",
            "account",
            "permission",
            "permissions",
            "access denied",
            "mfa",
            "2fa",
            "sso",
        ],
        suggestions: &[
            "Use the self-service password reset portal",
            "Check that Caps Lock is off",
            "Wait 15 minutes for an account lockout to clear",
            "Confirm the clock on your MFA device is correct",
            "Sign out completely and sign back in",
        ],
        default_priority: Priority::Medium,
    },
    CategoryRule {
        category: Category::Email,
        keywords: &[
            "email",
            "e-mail",
            "outlook",
            "mailbox",
            "inbox",
            "calendar",
            "smtp",
            "attachment",
        ],
        suggestions: &[
            "Check your internet connection",
            "Verify email server settings",
            "Restart Outlook in safe mode",
            "Clear browser cache and cookies",
            "Try accessing email from a different device",
        ],
        default_priority: Priority::Medium,
    },
    CategoryRule {
        category: Category::Hardware,
        keywords: &[
            "printer",
            "laptop",
            "monitor",
            "keyboard",
            "mouse",
            "screen",
            "battery",
            "dock",
            "docking",
            "headset",
            "hardware",
        ],
        suggestions: &[
            "Check that all cables are firmly connected",
            "Power the device off and on again",
            "Try a different power outlet or port",
            "Check Device Manager for warning icons",
            "Update the device drivers",
        ],
        default_priority: Priority::Medium,
    },
    CategoryRule {
        category: Category::Software,
        keywords: &[
            "install",
            "installation",
            "update",
            "crash",
            "crashes",
            "freezes",
            "application",
            "app",
            "software",
            "excel",
            "teams",
            "license",
        ],
        suggestions: &[
            "Restart the application",
            "Check for software updates",
            "Clear the application cache",
            "Reinstall the application if the problem persists",
            "Run the application as administrator",
        ],
        default_priority: Priority::Medium,
    },
];

/// Suggestions used when no category rule matched.
pub const GENERIC_SUGGESTIONS: &[&str] = &[
    "Restart the affected application or device",
    "Check network connectivity",
    "Check for pending system updates",
    "Write down any error messages you see",
];

/// Keywords that raise a ticket to critical.
pub const CRITICAL_KEYWORDS: &[&str] = &[
    "critical",
    "outage",
    "production",
    "all users",
    "everyone",
    "entire office",
    "emergency",
    "data loss",
    "security breach",
];

/// Keywords that raise a ticket to high.
pub const HIGH_KEYWORDS: &[&str] = &[
    "down",
    "cannot work",
    "can't work",
    "unable to work",
    "urgent",
    "asap",
    "blocked",
    "offline",
    "deadline",
];

/// Descriptions shorter than this (in characters) are flagged as brief.
pub const BRIEF_DESCRIPTION_CHARS: usize = 50;

/// Similar tickets must share more than this many distinct tokens.
pub const MIN_SHARED_TOKENS: usize = 2;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "but", "by", "can", "for", "from", "has", "have", "i",
    "in", "is", "it", "my", "not", "of", "on", "or", "our", "the", "this", "to", "was", "we",
    "with",
];

/// Where the priority of a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityBasis {
    /// Set by the requester.
    Explicit,
    /// Inferred from urgency keywords.
    Urgency,
    /// Default of the matched category rule.
    CategoryDefault,
    /// Nothing to go on.
    Fallback,
}

/// Category and priority decision for one ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub category_confidence: Score,
    /// Keywords of the chosen rule found in the ticket.
    pub matched_keywords: Vec<&'static str>,
    pub priority: Priority,
    pub priority_basis: PriorityBasis,
    /// Urgency keywords found, whatever decided the priority.
    pub urgency_keywords: Vec<&'static str>,
    /// Priority the urgency keywords alone would give.
    pub urgency_priority: Option<Priority>,
    rule: Option<&'static CategoryRule>,
}

/// Network-free triage over a static keyword table.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    roster: AgentRoster,
}

impl HeuristicClassifier {
    /// Create a classifier routing to the given roster
    pub fn new(roster: AgentRoster) -> Self {
        Self { roster }
    }

    /// The roster used for routing.
    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    /// Decide category and priority.
    pub fn classify(&self, ticket: &Ticket) -> Classification {
        let text = TokenText::new(&ticket.text());

        let mut best: Option<(&'static CategoryRule, Vec<&'static str>)> = None;
        for rule in CATEGORY_RULES {
            let matched: Vec<&'static str> = rule
                .keywords
                .iter()
                .copied()
                .filter(|k| text.contains(k))
                .collect();
            let beats = match &best {
                Some((_, current)) => matched.len() > current.len(),
                None => !matched.is_empty(),
            };
            if beats {
                best = Some((rule, matched));
            }
        }

        let (category, category_confidence, matched_keywords, rule) = match best {
            Some((rule, matched)) => {
                let ratio = matched.len() as f64 / rule.keywords.len() as f64;
                let confidence = Score::clamped(ratio.max(Score::FLOOR.value()));
                (rule.category, confidence, matched, Some(rule))
            }
            None => (ticket.category, Score::FLOOR, Vec::new(), None),
        };

        let critical: Vec<&'static str> = CRITICAL_KEYWORDS
            .iter()
            .copied()
            .filter(|k| text.contains(k))
            .collect();
        let high: Vec<&'static str> = HIGH_KEYWORDS
            .iter()
            .copied()
            .filter(|k| text.contains(k))
            .collect();
        let urgency_priority = if !critical.is_empty() {
            Some(Priority::Critical)
        } else if !high.is_empty() {
            Some(Priority::High)
        } else {
            None
        };
        let urgency_keywords: Vec<&'static str> = critical.into_iter().chain(high).collect();

        let (priority, priority_basis) = match (ticket.priority, urgency_priority, rule) {
            (Some(explicit), _, _) => (explicit, PriorityBasis::Explicit),
            (None, Some(urgent), _) => (urgent, PriorityBasis::Urgency),
            (None, None, Some(rule)) => (rule.default_priority, PriorityBasis::CategoryDefault),
            (None, None, None) => (Priority::Medium, PriorityBasis::Fallback),
        };

        Classification {
            category,
            category_confidence,
            matched_keywords,
            priority,
            priority_basis,
            urgency_keywords,
            urgency_priority,
            rule,
        }
    }

    /// Full analysis from the ticket alone; `similar_tickets` is empty.
    pub fn analyze(&self, ticket: &Ticket) -> TicketAnalysis {
        self.analyze_with_history(ticket, &[])
    }

    /// Full analysis, with similar tickets drawn from `history`.
    pub fn analyze_with_history(&self, ticket: &Ticket, history: &[Ticket]) -> TicketAnalysis {
        let classification = self.classify(ticket);

        TicketAnalysis {
            suggested_processor: self.suggest_processor(&classification),
            self_fix_suggestions: self_fix_suggestions(&classification),
            category_confidence: classification.category_confidence,
            priority_recommendation: priority_recommendation(&classification),
            similar_tickets: self.similar_tickets(ticket, history),
            estimated_resolution_time: resolution_time(classification.priority).to_string(),
            additional_insights: insights(ticket, &classification),
        }
    }

    /// Past tickets sharing enough distinct tokens with `ticket`, most similar first.
    ///
    /// The score is shared tokens over the larger token set. A history entry
    /// with the same id as `ticket` is skipped.
    pub fn similar_tickets(&self, ticket: &Ticket, history: &[Ticket]) -> Vec<SimilarTicket> {
        let target = content_tokens(&ticket.text());
        if target.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<SimilarTicket> = history
            .iter()
            .filter(|past| ticket.id.is_empty() || past.id != ticket.id)
            .filter_map(|past| {
                let tokens = content_tokens(&past.text());
                let shared = target.intersection(&tokens).count();
                if shared <= MIN_SHARED_TOKENS {
                    return None;
                }
                let denominator = target.len().max(tokens.len()) as f64;
                Some(SimilarTicket {
                    title: past.title.clone(),
                    similarity_score: Score::clamped(shared as f64 / denominator),
                    resolution_approach: past
                        .resolution
                        .clone()
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| "Standard troubleshooting".to_string()),
                })
            })
            .collect();

        // Stable sort keeps history order among equal scores.
        scored.sort_by(|a, b| b.similarity_score.value().total_cmp(&a.similarity_score.value()));
        scored.truncate(MAX_SIMILAR_TICKETS);
        scored
    }

    fn suggest_processor(&self, classification: &Classification) -> SuggestedProcessor {
        let category = classification.category;

        let Some(routing) = self.roster.best_for(category) else {
            return SuggestedProcessor {
                name: "Unassigned".to_string(),
                reason: "No agents are configured".to_string(),
                confidence_score: Score::FLOOR,
                matched_skills: Vec::new(),
                availability: Availability::Unknown,
            };
        };
        let agent = routing.agent;

        let (reason, confidence, matched_skills) = if routing.skill_match {
            let confidence = if agent.availability == Availability::Available {
                classification.category_confidence.value()
            } else {
                classification.category_confidence.value() * 0.8
            };
            let mut reason = format!("Handles {} tickets", category);
            if !agent.specialties.is_empty() {
                reason.push_str(&format!(" ({})", agent.specialties.join(", ")));
            }
            reason.push_str(&format!(" and is currently {}", agent.availability));
            (reason, confidence, vec![category.to_string()])
        } else {
            (
                format!("No agent lists {}; routed for general triage", category),
                Score::FLOOR.value(),
                Vec::new(),
            )
        };

        SuggestedProcessor {
            name: agent.name.clone(),
            reason,
            confidence_score: Score::clamped(confidence),
            matched_skills,
            availability: agent.availability,
        }
    }
}

/// Resolution time range for a priority.
pub fn resolution_time(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "1-2 hours",
        Priority::High => "2-4 hours",
        Priority::Medium => "4-8 hours",
        Priority::Low => "1-2 business days",
    }
}

fn self_fix_suggestions(classification: &Classification) -> Vec<String> {
    let source = classification
        .rule
        .map(|r| r.suggestions)
        .unwrap_or(GENERIC_SUGGESTIONS);
    source
        .iter()
        .take(MAX_SELF_FIX_SUGGESTIONS)
        .map(|s| s.to_string())
        .collect()
}

fn priority_recommendation(classification: &Classification) -> String {
    let level = classification.priority;
    let justification = match classification.priority_basis {
        PriorityBasis::Explicit => "Priority set by the requester".to_string(),
        PriorityBasis::Urgency => format!(
            "Urgency indicators found: {}",
            classification.urgency_keywords.join(", ")
        ),
        PriorityBasis::CategoryDefault => format!(
            "No urgency indicators; standard priority for {} issues",
            classification.category
        ),
        PriorityBasis::Fallback => "No urgency indicators found".to_string(),
    };
    format!("{} - {}.", level, justification)
}

fn insights(ticket: &Ticket, classification: &Classification) -> Vec<String> {
    let mut insights = Vec::new();

    if classification.matched_keywords.is_empty() {
        insights.push(format!(
            "No category keywords matched; kept category {}",
            classification.category
        ));
    } else {
        insights.push(format!(
            "Matched {} keywords: {}",
            classification.category,
            classification.matched_keywords.join(", ")
        ));
    }

    if ticket.description.trim().chars().count() < BRIEF_DESCRIPTION_CHARS {
        insights.push(
            "Ticket description is brief; more detail may be needed from the requester".to_string(),
        );
    }

    if let Some(department) = ticket.department.as_deref().filter(|d| !d.trim().is_empty()) {
        insights.push(format!(
            "Department context: {} may have specific requirements",
            department.trim()
        ));
    }

    if classification.priority_basis == PriorityBasis::Explicit {
        if let Some(urgent) = classification.urgency_priority {
            if urgent > classification.priority {
                insights.push(format!(
                    "Urgency keywords suggest {} priority; consider escalating",
                    urgent
                ));
            }
        }
    }

    insights.push("Escalate if the issue persists after the self-fix steps".to_string());
    insights.truncate(MAX_INSIGHTS);
    insights
}

/// Lowercased whole-token view of a text.
struct TokenText {
    padded: String,
}

impl TokenText {
    fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        Self {
            padded: format!(" {} ", tokens.join(" ")),
        }
    }

    fn contains(&self, keyword: &str) -> bool {
        self.padded.contains(&format!(" {} ", keyword))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn content_tokens(text: &str) -> BTreeSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classifier() -> HeuristicClassifier {
        HeuristicClassifier::default()
    }

    #[test]
    fn test_rule_table_is_well_formed() {
        let mut seen = Vec::new();
        for rule in CATEGORY_RULES {
            assert!(!seen.contains(&rule.category), "duplicate rule {}", rule.category);
            seen.push(rule.category);
            assert!(!rule.keywords.is_empty());
            assert!(rule.suggestions.len() >= 2);
            assert!(rule.suggestions.len() <= MAX_SELF_FIX_SUGGESTIONS);
            for keyword in rule.keywords {
                assert_eq!(*keyword, keyword.to_lowercase());
                assert_eq!(tokenize(keyword).join(" "), *keyword);
            }
        }
        assert!(GENERIC_SUGGESTIONS.len() >= 2);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("VPN won't connect (error-807)!"),
            vec!["vpn", "won't", "connect", "error-807"]
        );
        assert_eq!(tokenize("Can\u{2019}t work"), vec!["can't", "work"]);
        assert_eq!(tokenize("  "), Vec::<String>::new());
    }

    #[test]
    fn test_keywords_match_whole_tokens_only() {
        let text = TokenText::new("My password expired");
        assert!(text.contains("password"));
        assert!(!text.contains("word"));

        let text = TokenText::new("I am locked out of my laptop");
        assert!(text.contains("locked out"));
        assert!(!text.contains("out of the"));
    }

    #[test]
    fn test_classify_network_ticket() {
        let ticket = Ticket::new(
            "VPN won't connect",
            "cannot connect to VPN from home, error code 807",
        );
        let c = classifier().classify(&ticket);

        assert_eq!(c.category, Category::Network);
        assert_eq!(c.matched_keywords, vec!["vpn"]);
        assert_eq!(c.category_confidence, Score::FLOOR);
        assert_eq!(c.priority, Priority::Medium);
        assert_eq!(c.priority_basis, PriorityBasis::CategoryDefault);
        assert!(c.urgency_keywords.is_empty());
    }

    #[test]
    fn test_classify_confidence_grows_with_matches() {
        let ticket = Ticket::new(
            "Network issues",
            "vpn drops, wifi slow, internet flaky, dns failing, router blinking",
        );
        let c = classifier().classify(&ticket);
        assert_eq!(c.category, Category::Network);
        assert_eq!(c.matched_keywords.len(), 6);
        assert!((c.category_confidence.value() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_classify_tie_goes_to_earlier_rule() {
        // "phishing" (Security) and "email" (Email) each match once
        let ticket = Ticket::new("Phishing email", "");
        assert_eq!(classifier().classify(&ticket).category, Category::Security);

        // "vpn" (Network) and "login" (Access) each match once
        let ticket = Ticket::new("VPN login", "");
        assert_eq!(classifier().classify(&ticket).category, Category::Network);
    }

    #[test]
    fn test_classify_no_match_keeps_ticket_category() {
        let ticket = Ticket::new("Question", "Where is the kitchen?");
        let c = classifier().classify(&ticket);
        assert_eq!(c.category, Category::Other);
        assert_eq!(c.category_confidence, Score::FLOOR);
        assert!(c.matched_keywords.is_empty());
        assert_eq!(c.priority, Priority::Medium);
        assert_eq!(c.priority_basis, PriorityBasis::Fallback);

        let ticket = Ticket::new("Question", "Where is the kitchen?").with_category(Category::Email);
        assert_eq!(classifier().classify(&ticket).category, Category::Email);
    }

    #[test]
    fn test_priority_urgency_tiers() {
        let ticket = Ticket::new(
            "Server down, production impacted",
            "main application server is down, all users affected",
        );
        let c = classifier().classify(&ticket);
        assert_eq!(c.priority, Priority::Critical);
        assert_eq!(c.priority_basis, PriorityBasis::Urgency);
        assert!(c.urgency_keywords.contains(&"down"));
        assert!(c.urgency_keywords.contains(&"production"));

        let ticket = Ticket::new("Printer offline", "urgent, need it for a report");
        let c = classifier().classify(&ticket);
        assert_eq!(c.priority, Priority::High);
        assert_eq!(c.category, Category::Hardware);
    }

    #[test]
    fn test_explicit_priority_wins() {
        let ticket =
            Ticket::new("Outage", "production is down").with_priority(Priority::Low);
        let c = classifier().classify(&ticket);
        assert_eq!(c.priority, Priority::Low);
        assert_eq!(c.priority_basis, PriorityBasis::Explicit);
        assert_eq!(c.urgency_priority, Some(Priority::Critical));

        let analysis = classifier().analyze(&ticket);
        assert!(analysis
            .additional_insights
            .iter()
            .any(|i| i.contains("consider escalating")));
    }

    #[test]
    fn test_security_default_priority_is_high() {
        let ticket = Ticket::new("Suspicious message", "Got a phishing message");
        let c = classifier().classify(&ticket);
        assert_eq!(c.category, Category::Security);
        assert_eq!(c.priority, Priority::High);
        assert_eq!(c.priority_basis, PriorityBasis::CategoryDefault);
    }

    #[test]
    fn test_analyze_network_ticket() {
        let ticket = Ticket::new(
            "VPN won't connect",
            "cannot connect to VPN from home, error code 807",
        );
        let analysis = classifier().analyze(&ticket);

        assert_eq!(analysis.estimated_resolution_time, "4-8 hours");
        assert!(analysis.priority_recommendation.starts_with("medium - "));
        assert!(analysis
            .self_fix_suggestions
            .iter()
            .any(|s| s.contains("VPN") || s.to_lowercase().contains("network")));
        assert_eq!(analysis.suggested_processor.name, "Bob Smith");
        assert_eq!(analysis.suggested_processor.availability, Availability::Available);
        assert_eq!(analysis.suggested_processor.matched_skills, vec!["Network"]);
        assert_eq!(
            analysis.suggested_processor.confidence_score,
            analysis.category_confidence
        );
        assert!(analysis.similar_tickets.is_empty());
        assert!(analysis.check_limits().is_ok());
    }

    #[test]
    fn test_analyze_empty_ticket_is_total() {
        let analysis = classifier().analyze(&Ticket::default());
        assert_eq!(analysis.self_fix_suggestions[0], "Restart the affected application or device");
        assert_eq!(analysis.self_fix_suggestions[1], "Check network connectivity");
        assert_eq!(analysis.category_confidence, Score::FLOOR);
        assert_eq!(analysis.estimated_resolution_time, "4-8 hours");
        assert!(!analysis.suggested_processor.name.is_empty());
        assert!(analysis.check_limits().is_ok());
    }

    #[test]
    fn test_busy_agent_confidence_is_discounted() {
        use crate::storage::Category::Hardware;
        use crate::triage::roster::Agent;

        let roster = AgentRoster::new(vec![Agent {
            name: "Carol".to_string(),
            skills: vec![Hardware],
            specialties: vec![],
            experience: String::new(),
            availability: Availability::Busy,
        }])
        .unwrap();
        let classifier = HeuristicClassifier::new(roster);
        let analysis = classifier.analyze(&Ticket::new("Laptop battery", ""));

        let expected = analysis.category_confidence.value() * 0.8;
        assert!((analysis.suggested_processor.confidence_score.value() - expected).abs() < 1e-9);
        assert_eq!(analysis.suggested_processor.availability, Availability::Busy);
    }

    #[test]
    fn test_unmatched_skill_uses_floor_confidence() {
        use crate::triage::roster::Agent;

        let roster = AgentRoster::new(vec![Agent {
            name: "Mail Person".to_string(),
            skills: vec![Category::Email],
            specialties: vec![],
            experience: String::new(),
            availability: Availability::Available,
        }])
        .unwrap();
        let analysis = HeuristicClassifier::new(roster).analyze(&Ticket::new("Printer jam", ""));

        assert_eq!(analysis.suggested_processor.name, "Mail Person");
        assert_eq!(analysis.suggested_processor.confidence_score, Score::FLOOR);
        assert!(analysis.suggested_processor.matched_skills.is_empty());
    }

    #[test]
    fn test_insights() {
        let ticket = Ticket::new("Printer jam", "Paper stuck").with_department("Finance");
        let analysis = classifier().analyze(&ticket);

        assert!(analysis.additional_insights[0].contains("printer"));
        assert!(analysis.additional_insights.iter().any(|i| i.contains("brief")));
        assert!(analysis.additional_insights.iter().any(|i| i.contains("Finance")));
        assert!(analysis.additional_insights.len() <= MAX_INSIGHTS);
    }

    #[test]
    fn test_similar_tickets_ranking() {
        let ticket = Ticket::new(
            "Outlook crashes on startup",
            "Outlook crashes every morning on startup after update",
        );
        let history = vec![
            Ticket::new("Printer jam", "Paper stuck in tray").resolved("Cleared tray"),
            Ticket::new(
                "Outlook crashes on startup",
                "Outlook crashes on startup after update",
            )
            .resolved("Repaired Office installation"),
            Ticket::new("Outlook crashes", "Outlook crashes after startup"),
        ];

        let similar = classifier().similar_tickets(&ticket, &history);
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].resolution_approach, "Repaired Office installation");
        assert_eq!(similar[1].resolution_approach, "Standard troubleshooting");
        assert!(similar[0].similarity_score >= similar[1].similarity_score);
        assert!(similar.iter().all(|s| s.similarity_score.value() <= 1.0));
    }

    #[test]
    fn test_similar_tickets_skips_self_and_caps() {
        let ticket = Ticket::new("VPN drops every hour", "VPN drops every hour at home");
        let mut history = vec![ticket.clone()];
        for i in 0..8 {
            history.push(Ticket::new(
                format!("VPN drops every hour #{}", i),
                "VPN drops",
            ));
        }

        let similar = classifier().similar_tickets(&ticket, &history);
        assert_eq!(similar.len(), MAX_SIMILAR_TICKETS);
        assert!(similar.iter().all(|s| s.title != ticket.title));
    }

    #[test]
    fn test_similar_tickets_requires_shared_tokens() {
        let ticket = Ticket::new("Monitor flickers", "");
        let history = vec![Ticket::new("Monitor flickers", "")];
        assert!(classifier().similar_tickets(&ticket, &history).is_empty());
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let ticket = Ticket::new("Outlook down", "Cannot work, inbox will not load")
            .with_department("Sales");
        let history = vec![Ticket::new("Inbox will not load", "Outlook inbox will not load")];
        let c = classifier();
        assert_eq!(
            c.analyze_with_history(&ticket, &history),
            c.analyze_with_history(&ticket, &history)
        );
    }
}
