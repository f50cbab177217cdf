//! Progress extraction from downloader output.
//!
//! Lines are decoded incrementally (`LineDecoder`) and classified by an
//! ordered rule table (`RuleSet`). The first rule that matches wins; a line
//! no rule understands yields `None`.

mod decode;
mod rules;

pub use decode::LineDecoder;
pub use rules::{
    condense_error_line, display_title_from_path, DestinationRule, PlaylistNameRule,
    ProgressLineRule, SkipMarkerRule, TrackBoundaryRule,
};

/// Structured event scraped from one output line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Numeric progress of the current file.
    Progress {
        percent: f64,
        size_label: Option<String>,
        speed: Option<String>,
        eta: Option<String>,
    },
    /// A new playlist item started (1-based index).
    TrackBoundary { index: u32, total: u32 },
    /// Output file announced; carries the display title.
    Destination { title: String },
    /// Playlist name announced.
    PlaylistName { title: String },
    /// Current item was skipped (unavailable, private, geo-blocked...).
    Skipped { reason: String },
}

/// One classification rule: `line → Option<ProgressEvent>`.
pub trait LineRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, line: &str) -> Option<ProgressEvent>;
}

/// Ordered, first-match-wins rule table.
pub struct RuleSet {
    rules: Vec<Box<dyn LineRule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Box<dyn LineRule>>) -> Self {
        Self { rules }
    }

    /// The rules for yt-dlp style output, in priority order.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ProgressLineRule),
            Box::new(TrackBoundaryRule),
            Box::new(DestinationRule),
            Box::new(PlaylistNameRule),
            Box::new(SkipMarkerRule),
        ])
    }

    pub fn classify(&self, line: &str) -> Option<ProgressEvent> {
        self.rules.iter().find_map(|rule| {
            let event = rule.classify(line)?;
            tracing::trace!(rule = rule.name(), ?event, "classified line");
            Some(event)
        })
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rule_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(&'static str);

    impl LineRule for Always {
        fn name(&self) -> &'static str {
            self.0
        }

        fn classify(&self, _line: &str) -> Option<ProgressEvent> {
            Some(ProgressEvent::PlaylistName {
                title: self.0.to_string(),
            })
        }
    }

    #[test]
    fn first_match_wins() {
        let set = RuleSet::new(vec![Box::new(Always("first")), Box::new(Always("second"))]);
        assert_eq!(
            set.classify("anything"),
            Some(ProgressEvent::PlaylistName {
                title: "first".to_string()
            })
        );
    }

    #[test]
    fn standard_order() {
        assert_eq!(
            RuleSet::standard().rule_names(),
            vec![
                "progress",
                "track-boundary",
                "destination",
                "playlist-name",
                "skip-marker"
            ]
        );
    }

    #[test]
    fn classifies_a_playlist_run() {
        let set = RuleSet::standard();
        let output = [
            "[youtube:tab] Extracting URL: https://www.youtube.com/playlist?list=PL1",
            "[download] Downloading playlist: Road Trip",
            "[download] Downloading item 1 of 2",
            "[download] Destination: /jobs/x/001 - Intro.webm",
            "[download]  50.0% of    3.20MiB at    1.00MiB/s ETA 00:02",
            "[download] Downloading item 2 of 2",
            "ERROR: [youtube] abc123: Video unavailable",
        ];
        let events: Vec<_> = output.iter().filter_map(|l| set.classify(l)).collect();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0],
            ProgressEvent::PlaylistName {
                title: "Road Trip".to_string()
            }
        );
        assert_eq!(events[1], ProgressEvent::TrackBoundary { index: 1, total: 2 });
        assert_eq!(
            events[2],
            ProgressEvent::Destination {
                title: "Intro".to_string()
            }
        );
        assert!(matches!(events[3], ProgressEvent::Progress { .. }));
        assert!(matches!(events[5], ProgressEvent::Skipped { .. }));
    }
}
