pub mod algo;
pub mod check;
pub mod global_router;
pub mod grid;

use global_router::GlobalRouter;
use grid::LatticeGraph;
use groute_common::db::core::RoutingProblem;
use groute_common::db::indices::EdgeId;
use groute_common::util::config::RouterConfig;
use std::collections::BTreeSet;

/// Routes every net of the problem over the given graph and verifies the
/// result. Returns one edge set per net, in problem order.
pub fn route(
    problem: &RoutingProblem,
    graph: &LatticeGraph,
    config: &RouterConfig,
) -> Result<Vec<BTreeSet<EdgeId>>, String> {
    let mut router = GlobalRouter::new(problem, graph, config);
    let trees = router.run();

    check::verify_routes(problem, graph, &trees)?;

    if router.emergency_reroutes() == 0 {
        check::verify_capacities(problem, graph, &trees)?;
    } else {
        log::warn!(
            "{} nets needed emergency mode; some edges exceed their capacity",
            router.emergency_reroutes()
        );
    }

    Ok(trees)
}
