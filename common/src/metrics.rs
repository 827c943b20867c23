use metrics::{describe_counter, describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "trace_aligner_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let git_rev = option_env!("GIT_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "git_version" => git_rev).set(1);
}

/// Registers descriptions of the counters used by the alignment engine.
pub fn describe_metrics() {
    describe_counter!(
        names::TRACES_PROCESSED,
        "Traces passed through the filter and trigger pipeline"
    );
    describe_counter!(
        names::TRACES_REJECTED,
        "Traces which contributed no crop, by reason"
    );
    describe_counter!(
        names::CROPS_ACCEPTED,
        "Cropped sub-traces accepted into the aligned dataset, by anchor"
    );
    describe_counter!(names::FAILURES, "Fatal failures by kind");
}

pub mod names {
    pub const TRACES_PROCESSED: &str = "trace_aligner_traces_processed";
    pub const TRACES_REJECTED: &str = "trace_aligner_traces_rejected";
    pub const CROPS_ACCEPTED: &str = "trace_aligner_crops_accepted";
    pub const FAILURES: &str = "trace_aligner_failures";
}

pub mod rejections {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum RejectionKind {
        TriggerNotFound,
        WindowOutOfBounds,
    }

    // Label building function
    pub fn get_label(rejection_kind: RejectionKind) -> (&'static str, &'static str) {
        (
            "reason",
            match rejection_kind {
                RejectionKind::TriggerNotFound => "trigger_not_found",
                RejectionKind::WindowOutOfBounds => "window_out_of_bounds",
            },
        )
    }
}

pub mod anchors {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum AnchorKind {
        Primary,
        Secondary,
    }

    // Label building function
    pub fn get_label(anchor_kind: AnchorKind) -> (&'static str, &'static str) {
        (
            "anchor",
            match anchor_kind {
                AnchorKind::Primary => "primary",
                AnchorKind::Secondary => "secondary",
            },
        )
    }
}

pub mod failures {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        DatasetLoadFailed,
        InvalidParameter,
        ExportFailed,
        Cancelled,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::DatasetLoadFailed => "dataset_load_failed",
                FailureKind::InvalidParameter => "invalid_parameter",
                FailureKind::ExportFailed => "export_failed",
                FailureKind::Cancelled => "cancelled",
            },
        )
    }
}
