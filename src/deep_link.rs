use std::fmt;
use std::str::FromStr;

/// Shareable location of a viewer: `"<job>"` or `"<job>:<line>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeepLink {
    pub job_id: String,
    pub line: Option<u64>,
}

impl DeepLink {
    pub fn new(job_id: impl Into<String>, line: Option<u64>) -> Self {
        Self {
            job_id: job_id.into(),
            line,
        }
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.job_id, line),
            None => f.write_str(&self.job_id),
        }
    }
}

impl FromStr for DeepLink {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim().trim_start_matches('#');
        if token.is_empty() {
            return Err("empty deep link".to_string());
        }
        // Job ids may contain ':' themselves; only a numeric suffix is a line.
        match token.rsplit_once(':') {
            Some((job, line)) if !job.is_empty() => match line.parse::<u64>() {
                Ok(line) => Ok(Self::new(job, Some(line))),
                Err(_) => Ok(Self::new(token, None)),
            },
            _ => Ok(Self::new(token, None)),
        }
    }
}
