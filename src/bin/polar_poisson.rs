//! Solves the field problem of a Vlasov-Poisson step for a manufactured potential and reports the
//! maximum errors of the potential and the electric field on the interpolation grid.
//!
//! ```text
//! polar-poisson <config.json>
//! polar-poisson --dump-config <config.json>
//! ```
use clap::Parser;
use eyre::eyre;
use log::{info, LevelFilter};
use nalgebra::DMatrix;
use polar_poisson::basis::BSplines;
use polar_poisson::config::{Config, MappingConfig, SolutionConfig};
use polar_poisson::manufactured::{CartesianSolution, CurvilinearSolution, ManufacturedPoissonTest, PoissonSolution};
use polar_poisson::mapping::{
    CircularToCartesian, CurvilinearToCartesian, CzarnyToCartesian, DiscreteToCartesian, DiscreteToCartesianBuilder,
};
use polar_poisson::polar::PolarBSplines;
use polar_poisson::solver::{PolarSplineFemPoissonLikeSolver, VectorField, VlasovPoissonSolver};
use polar_poisson::spline::{SplineBuilder2D, SplineEvaluator2D};
use polar_poisson::ExecutionContext;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "polar-poisson", about = "Polar spline Poisson solver for manufactured field problems")]
struct Opt {
    /// Write the default configuration to FILE and exit
    #[arg(long, value_name = "FILE", conflicts_with = "config")]
    dump_config: Option<PathBuf>,
    /// JSON configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "dump_config")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(err) => {
            // Help and version requests are not usage errors
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let result = match (opt.dump_config, opt.config) {
        (Some(path), _) => Config::default().write_json_file(path),
        (None, Some(path)) => {
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(LevelFilter::Info)
                .target(env_logger::Target::Stdout)
                .init();
            run(&path)
        }
        (None, None) => Err(eyre!("a configuration file is required")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &Path) -> eyre::Result<()> {
    let config = Config::from_json_file(config_path)?;
    let context = ExecutionContext::with_threads(config.num_threads)?;
    info!("Running on {} threads", context.num_threads());

    let start = Instant::now();
    let mesh = config.spline_mesh;
    let bsplines_r = Arc::new(BSplines::uniform(config.degree, false, 0.0, 1.0, mesh.r_ncells));
    let bsplines_theta = Arc::new(BSplines::uniform(config.degree, true, 0.0, 2.0 * PI, mesh.p_ncells));
    let builder = SplineBuilder2D::new(bsplines_r, bsplines_theta)?;
    info!("Spline mesh: {} x {} cells, degree {}", mesh.r_ncells, mesh.p_ncells, config.degree);

    match config.mapping {
        MappingConfig::Circular => run_with_mapping(&config, CircularToCartesian::new(), builder, start, &context),
        MappingConfig::Czarny { epsilon, e } => {
            run_with_mapping(&config, CzarnyToCartesian::new(epsilon, e), builder, start, &context)
        }
    }
}

fn run_with_mapping<M>(
    config: &Config,
    mapping: M,
    builder: SplineBuilder2D<f64>,
    start: Instant,
    context: &ExecutionContext,
) -> eyre::Result<()>
where
    M: CurvilinearToCartesian<f64> + Copy,
{
    let discrete_mapping = DiscreteToCartesianBuilder::new(builder.clone()).build(&mapping)?;
    let basis = PolarBSplines::new(
        builder.bsplines_r().clone(),
        builder.bsplines_theta().clone(),
        config.continuity,
        &discrete_mapping,
    );
    let setup = Setup {
        config,
        builder: &builder,
        discrete_mapping: &discrete_mapping,
        basis: Arc::new(basis),
        start,
        context,
    };

    match config.solution {
        SolutionConfig::Curvilinear => {
            let solution = CurvilinearSolution::new(mapping);
            setup.solve(&ManufacturedPoissonTest::with_profile(mapping, solution, config.coefficients))
        }
        SolutionConfig::Cartesian => {
            let solution = CartesianSolution::new(mapping);
            setup.solve(&ManufacturedPoissonTest::with_profile(mapping, solution, config.coefficients))
        }
    }
}

struct Setup<'a> {
    config: &'a Config,
    builder: &'a SplineBuilder2D<f64>,
    discrete_mapping: &'a DiscreteToCartesian<f64>,
    basis: Arc<PolarBSplines<f64>>,
    start: Instant,
    context: &'a ExecutionContext,
}

impl<'a> Setup<'a> {
    fn solve<M, S>(self, test: &ManufacturedPoissonTest<M, S>) -> eyre::Result<()>
    where
        M: CurvilinearToCartesian<f64>,
        S: PoissonSolution<f64>,
    {
        let builder = self.builder;
        let context = self.context;
        let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
        let alpha = builder.interpolate(|coord| test.alpha(coord))?;
        let beta = builder.interpolate(|coord| test.beta(coord))?;
        info!("Setup time: {} ms", self.start.elapsed().as_millis());

        let start = Instant::now();
        let poisson_solver = PolarSplineFemPoissonLikeSolver::with_spline_coefficients(
            self.basis,
            self.discrete_mapping,
            &evaluator,
            &alpha,
            &beta,
            context,
        )?;
        info!(
            "Poisson initialisation time: {} ms ({} unknowns)",
            start.elapsed().as_millis(),
            poisson_solver.num_unknowns()
        );

        let vlasov_solver = VlasovPoissonSolver::new(test.mapping(), builder, &evaluator, &poisson_solver)
            .with_epsilon(self.config.pole_epsilon);
        let (nr, ntheta) = builder.grid_shape();
        let coords = builder.interpolation_coordinates();
        let rho = context.map_collect(coords.len(), |i| test.rhs(coords[i]));
        let rho = DMatrix::from_row_slice(nr, ntheta, &rho);

        let start = Instant::now();
        let mut potential = DMatrix::zeros(nr, ntheta);
        let mut field = VectorField::zeros(nr, ntheta);
        vlasov_solver.solve(&rho, &mut potential, &mut field, context)?;
        info!("Solver time: {} ms", start.elapsed().as_millis());

        let mut max_errors = [0.0f64; 3];
        for (idx, coord) in coords.iter().enumerate() {
            let (i, j) = (idx / ntheta, idx % ntheta);
            let computed = [potential[(i, j)], field.x[(i, j)], field.y[(i, j)]];
            if computed.iter().any(|value| !value.is_finite()) {
                return Err(eyre!("Non-finite output at r = {}, theta = {}", coord.r, coord.theta));
            }
            let exact_field = test.solution().electric_field(coord);
            let exact = [test.potential(*coord), exact_field.x, exact_field.y];
            for (max_error, (value, reference)) in max_errors.iter_mut().zip(computed.iter().zip(&exact)) {
                *max_error = max_error.max((value - reference).abs());
            }
        }
        info!("Max error potential: {:e}", max_errors[0]);
        info!("Max error Ex: {:e}", max_errors[1]);
        info!("Max error Ey: {:e}", max_errors[2]);
        Ok(())
    }
}
