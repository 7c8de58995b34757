use reqwest::Client;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// Parsed robots.txt. An empty rule set allows everything.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    pub fn allow_all() -> Self {
        RobotsRules::default()
    }

    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = vec![];
        let mut current = Group::default();
        let mut reading_agents = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !reading_agents && !current.agents.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_lowercase());
                    reading_agents = true;
                }
                "allow" | "disallow" => {
                    reading_agents = false;
                    // An empty Disallow means "allow everything" and adds no rule.
                    if !value.is_empty() {
                        current.rules.push(Rule {
                            allow: key == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        RobotsRules { groups }
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let product = user_agent
            .split(['/', ' '])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        let group = self
            .groups
            .iter()
            .find(|g| {
                g.agents
                    .iter()
                    .any(|a| a != "*" && !product.is_empty() && product.contains(a.as_str()))
            })
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        let Some(group) = group else {
            return true;
        };

        group
            .rules
            .iter()
            .filter(|rule| pattern_matches(&rule.pattern, path))
            .max_by_key(|rule| (rule.pattern.len(), rule.allow))
            .map(|rule| rule.allow)
            .unwrap_or(true)
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    for (i, piece) in pieces.iter().enumerate() {
        let is_last = i == pieces.len() - 1;
        if is_last && anchored {
            return rest.ends_with(piece);
        }
        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }

    !anchored || rest.is_empty()
}

/// Fetches `robots.txt` for the host of `page`. Missing or unreachable files allow everything.
pub async fn fetch_robots(client: &Client, page: &Url) -> RobotsRules {
    let Ok(robots_url) = page.join("/robots.txt") else {
        return RobotsRules::allow_all();
    };

    match client.get(robots_url.clone()).send().await {
        Ok(res) if res.status().is_success() => match res.text().await {
            Ok(body) => RobotsRules::parse(&body),
            Err(e) => {
                log::warn!("Failed to read {}: {:?}", robots_url, e);
                RobotsRules::allow_all()
            }
        },
        Ok(res) => {
            log::debug!("{} answered {}, allowing all", robots_url, res.status());
            RobotsRules::allow_all()
        }
        Err(e) => {
            log::warn!("Failed to fetch {}: {:?}", robots_url, e);
            RobotsRules::allow_all()
        }
    }
}
