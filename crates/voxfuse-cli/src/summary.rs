use console::Style;
use voxfuse_core::pipeline::config::{
    PreprocessConfig, ReconConfig, Regularization, RegistrationConfig,
};
use voxfuse_core::pipeline::{PreprocessOutput, ReconOutput};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!(
        "  {}",
        s.title.apply_to("\u{2550}".repeat(title.chars().count()))
    );
    println!();
}

pub fn print_preprocess_summary(config: &PreprocessConfig) {
    let s = Styles::new();
    print_title(&s, "voxfuse preprocess");

    println!("  {}", s.header.apply_to("Views"));
    for (i, path) in config.input_paths().iter().enumerate() {
        let role = if i == 0 { "reference" } else { "view" };
        println!(
            "    {:<12}{}",
            s.label.apply_to(format!("{role} {i}")),
            s.path.apply_to(path.display())
        );
    }
    println!();

    match &config.size {
        Some(size) => println!(
            "  {:<14}{}",
            s.label.apply_to("Size"),
            s.value.apply_to(format!("{size:?}"))
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Size"),
            s.disabled.apply_to("from reference extent")
        ),
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Working dir"),
        s.path.apply_to(config.working_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output dir"),
        s.path.apply_to(config.output_dir.display())
    );

    if config.resample_only {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Registration"),
            s.disabled.apply_to("skipped (resample only)")
        );
    } else {
        let method = match &config.registration {
            RegistrationConfig::Identity => "identity".to_string(),
            RegistrationConfig::PhaseCorrelation { min_peak } => {
                format!("phase correlation (min peak {min_peak})")
            }
            RegistrationConfig::Command { program, .. } => {
                format!("command {}", program.display())
            }
        };
        println!(
            "  {:<14}{}",
            s.label.apply_to("Registration"),
            s.method.apply_to(method)
        );
    }
    println!();
}

pub fn print_recon_summary(config: &ReconConfig) {
    let s = Styles::new();
    print_title(&s, "voxfuse recon");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Working dir"),
        s.path.apply_to(config.working_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output dir"),
        s.path.apply_to(config.output_dir.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Deconvolution"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(&config.regularization)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Weight"),
        s.value.apply_to(config.reg_weight)
    );
    if let Regularization::Ggr(params) = &config.regularization {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Edge tau"),
            s.value.apply_to(format!("{:.0}th percentile", params.tau_percentile * 100.0))
        );
        println!(
            "    {:<14}{}",
            s.label.apply_to("Scale"),
            s.value.apply_to(params.scale)
        );
        println!(
            "    {:<14}{}",
            s.label.apply_to("Decay"),
            s.value.apply_to(params.alpha)
        );
    }
    let negatives = if config.keep_negative_values {
        s.value.apply_to("kept")
    } else {
        s.disabled.apply_to("clipped to 0")
    };
    println!("    {:<14}{}", s.label.apply_to("Negatives"), negatives);
    println!();
}

pub fn print_preprocess_result(output: &PreprocessOutput) {
    let s = Styles::new();
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Grid"),
        s.value.apply_to(format!(
            "{} x {} x {} @ {:.4}",
            output.canonical.size[0],
            output.canonical.size[1],
            output.canonical.size[2],
            output.canonical.spacing[0]
        ))
    );
    for path in &output.outputs {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Saved"),
            s.path.apply_to(path.display())
        );
    }
}

pub fn print_recon_result(output: &ReconOutput) {
    let s = Styles::new();
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Views"),
        s.value.apply_to(output.views)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Saved"),
        s.path.apply_to(output.reconstruction.display())
    );
    if let Some(preview) = &output.preview {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Preview"),
            s.path.apply_to(preview.display())
        );
    }
}
