use predicates::str::diff;

#[test]
fn show_config_prints_merged_configuration() {
    let expected = concat!(
        "Application tier: 4 cores, service time 1, queue capacity 10\n",
        "Database tier: 2 cores, service time 1, queue capacity 10\n",
        "app_to_db_prob: 0.5\n",
        "think_time: 1\n",
        "high_priority_prob: 0.2\n",
        "clients: 10\n",
        "horizon: 1000\n",
        "retry_delay: 5\n",
        "timeout: 100\n",
        "call_mode: sync\n",
        "timing: exponential\n",
        "seed: 42\n",
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tier-sim");
    cmd.args(["show-config", "--app-cores", "4", "--sync", "--seed", "42"]);
    cmd.assert().success().stdout(diff(expected));
}

#[test]
fn show_config_rejects_invalid_values() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tier-sim");
    cmd.args(["show-config", "--horizon", "0"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Error: horizon must be > 0 (got 0)"));
}
