use std::process::Command;

/// Filter string selecting `test_name` inside `module_path` when handed to
/// the test runner. `module_path!()` includes the crate name, which is not
/// part of the runner's namespace and gets stripped here.
pub(crate) fn runner_filter(module_path: &str, test_name: &str) -> String {
    match module_path.split_once("::") {
        Some((_crate_name, modules)) => format!("{modules}::{test_name}"),
        None => test_name.to_string(),
    }
}

/// Re-launches the test suite under `mpirun` on `processes` ranks, running
/// only the test selected by `filter`. The selected test is `#[ignore]`d,
/// so it executes on the spawned ranks and nowhere else; the calling test
/// fails if any rank does.
pub(crate) fn relaunch_under_mpirun(filter: &str, processes: usize) {
    let status = Command::new("mpirun")
        .arg("-n")
        .arg(processes.to_string())
        .args(["--allow-run-as-root", "cargo", "test", "--features", "mpi"])
        .arg(filter)
        .args(["--", "--ignored", "--exact"])
        .status()
        .expect("failed to launch mpirun");
    assert!(status.success(), "MPI test {filter} failed");
}

/// Declares a test body that runs on the given number of MPI ranks.
///
/// Expands to a pair of tests: the one carrying the given name re-launches
/// the suite under `mpirun`, and a hidden `*_on_ranks` companion holds the
/// body, ignored under a plain `cargo test` so that only the relaunched
/// processes execute it.
#[macro_export]
macro_rules! mpi_test {
    ($processes:expr, fn $name:ident() $body:block) => {
        paste::paste! {
            #[test]
            fn $name() {
                let filter = $crate::mpi::testing::runner_filter(
                    module_path!(),
                    concat!(stringify!($name), "_on_ranks"),
                );
                $crate::mpi::testing::relaunch_under_mpirun(&filter, $processes);
            }

            #[test]
            #[ignore = "runs on MPI ranks via the companion test"]
            fn [<$name _on_ranks>]() $body
        }
    };
}

#[cfg(test)]
mod tests {
    use super::runner_filter;

    #[test]
    fn test_runner_filter_strips_crate_name() {
        assert_eq!(runner_filter("tilesparse", "sums"), "sums");
        assert_eq!(runner_filter("tilesparse::mpi", "sums"), "mpi::sums");
        assert_eq!(
            runner_filter("tilesparse::mpi::communication::tests", "sums"),
            "mpi::communication::tests::sums"
        );
    }
}
