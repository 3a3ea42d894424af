//! `issuer csv-sample`: print an example input file

use clap::{Args, ValueEnum};
use issuer_core::graph::{META_SAMPLE, PARENT_SAMPLE};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SampleKind {
    /// meta_issue_id / sub_issue_id columns
    #[default]
    Meta,
    /// project_issue_id / project_parent_issue_id columns
    Parent,
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Which column convention to show
    #[arg(long, value_enum, default_value_t)]
    pub schema: SampleKind,
}

impl SampleArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        print!("{}", sample(self.schema));
        Ok(())
    }
}

fn sample(kind: SampleKind) -> &'static str {
    match kind {
        SampleKind::Meta => META_SAMPLE,
        SampleKind::Parent => PARENT_SAMPLE,
    }
}
