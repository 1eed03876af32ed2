use socktest_harness::structured_log::{LogEmitter, validate_log_text};
use socktest_harness::{Backend, Scenario, scenario};

fn run(s: Scenario, backend: Backend) -> (socktest_harness::ScenarioReport, String) {
    let mut log = LogEmitter::to_buffer("test", s.name());
    let report = scenario::run(s, backend, &mut log).unwrap();
    (report, log.buffered().unwrap().to_string())
}

#[test]
fn every_scenario_passes_on_sim() {
    for s in Scenario::ALL {
        let (report, _) = run(s, Backend::Sim);
        let failed: Vec<_> = report.failures().collect();
        assert!(report.passed, "{}: {failed:?}", s.name());
        assert!(!report.checks.is_empty());
        assert_eq!(report.scenario, s.name());
    }
}

#[test]
fn scenarios_leave_no_tracked_sockets() {
    for s in Scenario::ALL {
        let (report, _) = run(s, Backend::Sim);
        assert!(report.sockets.is_empty(), "{}: {:?}", s.name(), report.sockets);
    }
}

#[test]
fn logs_validate_and_bracket_the_run() {
    for s in Scenario::ALL {
        let (_, text) = run(s, Backend::Sim);
        let (lines, errors) = validate_log_text(&text);
        assert!(errors.is_empty(), "{}: {errors:?}", s.name());
        assert!(lines >= 3);

        let events: Vec<String> = text
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("scenario_start"));
        assert_eq!(events.last().map(String::as_str), Some("scenario_end"));
    }
}

#[test]
fn refused_connect_is_logged_with_errno() {
    let (_, text) = run(Scenario::ConnectRefused, Backend::Sim);
    let connect: serde_json::Value = text
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .find(|v| v["op"] == "connect")
        .expect("connect logged");
    assert_eq!(connect["level"], "warn");
    assert_eq!(connect["errno"], 111);
    assert_eq!(connect["details"]["error"], "ECONNREFUSED");
    assert_eq!(connect["backend"], "sim");
}

#[test]
fn report_carries_stats_per_cookie() {
    let (report, _) = run(Scenario::OpenClose, Backend::Sim);
    let labels: Vec<_> = report.stats.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["(local, stream, default)", "(inet4, stream, tcp)"]);
    assert_eq!(report.stats[1].opened, 2);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["passed"], true);
    assert_eq!(json["backend"], "sim");
}

#[cfg(target_os = "linux")]
#[test]
fn every_scenario_passes_on_host() {
    for s in Scenario::ALL {
        let (report, text) = run(s, Backend::Host);
        let failed: Vec<_> = report.failures().collect();
        assert!(report.passed, "{}: {failed:?}\n{text}", s.name());
    }
}
