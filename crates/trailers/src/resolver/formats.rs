use super::utils::non_empty;

/// One available encoding of a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormatCandidate {
    /// Label whose leading digits give the vertical resolution, e.g. "1080p".
    pub quality_label: String,
    pub video_url: Option<String>,
}

impl VideoFormatCandidate {
    pub fn new<L: Into<String>>(quality_label: L, video_url: Option<&str>) -> Self {
        Self {
            quality_label: quality_label.into(),
            video_url: video_url.and_then(non_empty).map(ToOwned::to_owned),
        }
    }

    pub fn resolution(&self) -> Option<u32> {
        parse_resolution(&self.quality_label)
    }
}

/// The leading digit run of a quality label.
///
/// Labels without leading digits yield `None`, which orders below every
/// parsed resolution.
pub fn parse_resolution(label: &str) -> Option<u32> {
    let end = label
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(label.len());
    label[..end].parse().ok()
}

/// Stable maximum by resolution: on ties the first candidate wins.
pub fn select_best<'a, I>(candidates: I) -> Option<&'a VideoFormatCandidate>
where
    I: IntoIterator<Item = &'a VideoFormatCandidate>,
{
    let mut best: Option<(&VideoFormatCandidate, Option<u32>)> = None;
    for candidate in candidates {
        let res = candidate.resolution();
        match best {
            Some((_, best_res)) if res <= best_res => {}
            _ => best = Some((candidate, res)),
        }
    }
    best.map(|(candidate, _)| candidate)
}
