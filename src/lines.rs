//! Grouping of positioned text runs into visual lines.
//!
//! Runs are clustered by their baseline: a run joins an existing line when
//! its `y` lies within `tolerance` of that line's anchor, otherwise it starts
//! a new line anchored at its own `y`. Lines come out top of the page first
//! (PDF `y` grows upward) and each line's runs are ordered left to right.

use tracing::debug;

use crate::types::TextRun;

/// Default vertical distance, in points, for two runs to share a line.
pub const DEFAULT_TOLERANCE: f64 = 2.0;

/// Font size used when a line's size cannot be averaged.
pub const FALLBACK_FONT_SIZE: f64 = 10.0;

/// How a run picks between several lines whose anchors are within tolerance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnchorStrategy {
    /// The earliest created line within tolerance wins, even when a later
    /// line's anchor is closer. Interleaved baseline jitter can misgroup.
    #[default]
    FirstFit,
    /// The line whose anchor is closest wins; ties go to the earlier line.
    NearestFit,
}

/// Runs judged to share one visual line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// `y` of the run that started this line.
    pub anchor_y: f64,
    /// Ordered by ascending `x` once returned from [`LineReconstructor`].
    pub members: Vec<TextRun>,
}

impl Line {
    fn new(first: TextRun) -> Self {
        Line {
            anchor_y: first.y,
            members: vec![first],
        }
    }

    /// Member texts joined with a single space.
    pub fn combined_text(&self) -> String {
        let mut text = String::new();
        for (i, run) in self.members.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(&run.text);
        }
        text
    }

    /// Unweighted mean of the members' font sizes.
    pub fn representative_font_size(&self) -> f64 {
        if self.members.is_empty() {
            return FALLBACK_FONT_SIZE;
        }

        let mean =
            self.members.iter().map(|r| r.font_size).sum::<f64>() / self.members.len() as f64;
        if mean.is_finite() && mean > 0.0 {
            mean
        } else {
            FALLBACK_FONT_SIZE
        }
    }

    /// `x` of the leftmost member.
    pub fn x(&self) -> f64 {
        self.members.first().map_or(0.0, |r| r.x)
    }

    fn sort_members(&mut self) {
        self.members.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineReconstructor {
    tolerance: f64,
    strategy: AnchorStrategy,
}

impl Default for LineReconstructor {
    fn default() -> Self {
        LineReconstructor {
            tolerance: DEFAULT_TOLERANCE,
            strategy: AnchorStrategy::FirstFit,
        }
    }
}

impl LineReconstructor {
    pub fn new(tolerance: f64, strategy: AnchorStrategy) -> Self {
        LineReconstructor {
            tolerance: tolerance.abs(),
            strategy,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn strategy(&self) -> AnchorStrategy {
        self.strategy
    }

    /// Cluster one page's runs, given in content-stream order, into lines.
    pub fn reconstruct<I>(&self, runs: I) -> Vec<Line>
    where
        I: IntoIterator<Item = TextRun>,
    {
        // Insertion order matters for first-fit, so this stays a Vec.
        let mut lines: Vec<Line> = Vec::new();

        for run in runs {
            match self.find_line(&lines, run.y) {
                Some(idx) => lines[idx].members.push(run),
                None => lines.push(Line::new(run)),
            }
        }

        lines.sort_by(|a, b| b.anchor_y.total_cmp(&a.anchor_y));
        for line in &mut lines {
            line.sort_members();
        }

        debug!(
            "reconstructed {} lines (tolerance {}, {:?})",
            lines.len(),
            self.tolerance,
            self.strategy
        );
        lines
    }

    fn find_line(&self, lines: &[Line], y: f64) -> Option<usize> {
        let mut candidates = lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx, (line.anchor_y - y).abs()))
            .filter(|&(_, distance)| distance <= self.tolerance);

        match self.strategy {
            AnchorStrategy::FirstFit => candidates.next().map(|(idx, _)| idx),
            AnchorStrategy::NearestFit => candidates
                .reduce(|best, next| if next.1 < best.1 { next } else { best })
                .map(|(idx, _)| idx),
        }
    }
}

/// Reconstruct lines with the default tolerance and first-fit matching.
pub fn reconstruct_lines<I>(runs: I) -> Vec<Line>
where
    I: IntoIterator<Item = TextRun>,
{
    LineReconstructor::default().reconstruct(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f64, y: f64) -> TextRun {
        TextRun::new(text, x, y, 12.0)
    }

    fn texts(lines: &[Line]) -> Vec<String> {
        lines.iter().map(Line::combined_text).collect()
    }

    #[test]
    fn no_runs_no_lines() {
        assert!(reconstruct_lines(Vec::new()).is_empty());
    }

    #[test]
    fn hello_world_page() {
        let lines = reconstruct_lines(vec![
            run("Hello", 10., 700.),
            run("World", 60., 700.),
            run("Line2", 10., 650.),
        ]);
        assert_eq!(texts(&lines), ["Hello World", "Line2"]);
        assert_eq!(lines[0].anchor_y, 700.);
        assert_eq!(lines[1].anchor_y, 650.);
    }

    #[test]
    fn members_are_ordered_left_to_right() {
        let lines = reconstruct_lines(vec![
            run("c", 300., 500.),
            run("a", 10., 500.5),
            run("b", 150., 499.),
        ]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].combined_text(), "a b c");
        assert_eq!(lines[0].x(), 10.);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let lines = reconstruct_lines(vec![run("a", 0., 700.), run("b", 10., 702.)]);
        assert_eq!(lines.len(), 1);

        let lines = reconstruct_lines(vec![run("a", 0., 700.), run("b", 10., 703.)]);
        assert_eq!(lines.len(), 2);
        assert_eq!(texts(&lines), ["b", "a"]);
    }

    #[test]
    fn distant_runs_each_get_a_line() {
        let ys = [100., 400., 250., 700., 10.];
        let runs = ys.iter().map(|&y| run("x", 0., y));
        let lines = reconstruct_lines(runs);
        let anchors: Vec<f64> = lines.iter().map(|l| l.anchor_y).collect();
        assert_eq!(anchors, [700., 400., 250., 100., 10.]);
    }

    #[test]
    fn anchor_is_the_first_seen_y() {
        let lines = reconstruct_lines(vec![run("a", 0., 701.5), run("b", 10., 700.)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].anchor_y, 701.5);
    }

    #[test]
    fn first_fit_ignores_a_closer_later_anchor() {
        let runs = vec![run("a", 0., 100.), run("b", 0., 103.), run("c", 5., 101.8)];

        let first = LineReconstructor::new(2.0, AnchorStrategy::FirstFit).reconstruct(runs.clone());
        assert_eq!(texts(&first), ["b", "a c"]);

        let nearest = LineReconstructor::new(2.0, AnchorStrategy::NearestFit).reconstruct(runs);
        assert_eq!(texts(&nearest), ["b c", "a"]);
    }

    #[test]
    fn nearest_fit_ties_go_to_the_earlier_line() {
        let runs = vec![run("a", 0., 100.), run("b", 0., 103.), run("c", 5., 101.5)];
        let lines = LineReconstructor::new(2.0, AnchorStrategy::NearestFit).reconstruct(runs);
        assert_eq!(texts(&lines), ["b", "a c"]);
    }

    #[test]
    fn font_size_is_the_mean() {
        let lines = reconstruct_lines(vec![
            TextRun::new("a", 0., 10., 10.),
            TextRun::new("b", 5., 10., 14.),
            TextRun::new("c", 9., 10., 12.),
        ]);
        assert!((lines[0].representative_font_size() - 12.).abs() < 1e-9);

        let uniform = reconstruct_lines(vec![
            TextRun::new("a", 0., 10., 9.5),
            TextRun::new("b", 5., 10., 9.5),
        ]);
        assert_eq!(uniform[0].representative_font_size(), 9.5);
    }

    #[test]
    fn empty_or_degenerate_lines_fall_back_to_ten_points() {
        let empty = Line {
            anchor_y: 0.,
            members: Vec::new(),
        };
        assert_eq!(empty.representative_font_size(), FALLBACK_FONT_SIZE);

        let zero = reconstruct_lines(vec![TextRun::new("a", 0., 10., 0.)]);
        assert_eq!(zero[0].representative_font_size(), FALLBACK_FONT_SIZE);
    }

    #[test]
    fn negative_tolerance_is_treated_as_its_magnitude() {
        let r = LineReconstructor::new(-3.0, AnchorStrategy::FirstFit);
        assert_eq!(r.tolerance(), 3.0);
        assert_eq!(r.reconstruct(vec![run("a", 0., 0.), run("b", 1., 3.)]).len(), 1);
    }
}
