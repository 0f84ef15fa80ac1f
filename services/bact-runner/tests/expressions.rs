//! End-to-end expression evaluation against a realistic pull-request
//! context.

use std::collections::HashMap;

use bact_runner::expr::{
    Evaluator, GithubContext, JobContext, NeedsContext, RunnerContext, StepsContextEntry,
    StrategyContext,
};
use bact_runner::expr::{parser, EvalContext};

fn string_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A realistic context for a pull request workflow run.
fn pr_context() -> EvalContext {
    EvalContext {
        github: GithubContext {
            action: "__run".to_string(),
            actor: "octocat".to_string(),
            actor_id: "583231".to_string(),
            api_url: "https://api.github.com".to_string(),
            base_ref: "main".to_string(),
            event: serde_json::json!({
                "action": "opened",
                "number": 42,
                "pull_request": {
                    "title": "Add new feature",
                    "body": "This PR adds a cool new feature",
                    "number": 42,
                    "head": {"ref": "feature/awesome", "sha": "abc123def456"},
                    "base": {"ref": "main", "sha": "789xyz000111"},
                    "user": {"login": "octocat", "id": 583231},
                    "draft": false,
                    "mergeable": true,
                },
                "repository": {
                    "full_name": "octocat/hello-world",
                    "name": "hello-world",
                    "owner": {"login": "octocat"},
                },
                "sender": {"login": "octocat", "id": 583231},
            }),
            event_name: "pull_request".to_string(),
            graphql_url: "https://api.github.com/graphql".to_string(),
            head_ref: "feature/awesome".to_string(),
            job: "build".to_string(),
            r#ref: "refs/pull/42/merge".to_string(),
            ref_name: "42/merge".to_string(),
            ref_type: "branch".to_string(),
            repository: "octocat/hello-world".to_string(),
            repository_id: "12345678".to_string(),
            repository_owner: "octocat".to_string(),
            repository_owner_id: "583231".to_string(),
            repository_url: "git://github.com/octocat/hello-world.git".to_string(),
            retention_days: "90".to_string(),
            run_id: "1234567890".to_string(),
            run_number: "15".to_string(),
            run_attempt: "1".to_string(),
            secret_source: "Actions".to_string(),
            server_url: "https://github.com".to_string(),
            sha: "abc123def456789abc123def456789abc123def4".to_string(),
            token: "***".to_string(),
            triggering_actor: "octocat".to_string(),
            workflow: "CI".to_string(),
            workflow_ref: "octocat/hello-world/.github/workflows/ci.yml@refs/pull/42/merge"
                .to_string(),
            workflow_sha: "abc123def456789abc123def456789abc123def4".to_string(),
            workspace: "/home/runner/work/hello-world/hello-world".to_string(),
            ..Default::default()
        },
        env: string_map(&[("CI", "true"), ("NODE_ENV", "test"), ("LOG_LEVEL", "debug")]),
        job: JobContext {
            check_run_id: 9876543210,
            status: "success".to_string(),
            ..Default::default()
        },
        steps: HashMap::from([
            (
                "checkout".to_string(),
                StepsContextEntry {
                    outputs: HashMap::new(),
                    conclusion: "success".to_string(),
                    outcome: "success".to_string(),
                },
            ),
            (
                "setup-node".to_string(),
                StepsContextEntry {
                    outputs: string_map(&[("node-version", "20.10.0")]),
                    conclusion: "success".to_string(),
                    outcome: "success".to_string(),
                },
            ),
        ]),
        runner: RunnerContext {
            name: "GitHub Actions 2".to_string(),
            os: "Linux".to_string(),
            arch: "X64".to_string(),
            temp: "/home/runner/work/_temp".to_string(),
            tool_cache: "/opt/hostedtoolcache".to_string(),
            environment: "github-hosted".to_string(),
            ..Default::default()
        },
        secrets: string_map(&[("GITHUB_TOKEN", "***"), ("NPM_TOKEN", "***")]),
        vars: string_map(&[("DEPLOYMENT_ENV", "staging"), ("APP_NAME", "hello-world")]),
        strategy: StrategyContext {
            fail_fast: true,
            job_index: 0,
            job_total: 1,
            max_parallel: 1,
        },
        matrix: serde_json::json!({"node-version": "20", "os": "ubuntu-latest"}),
        needs: HashMap::from([(
            "lint".to_string(),
            NeedsContext {
                outputs: string_map(&[("eslint-result", "passed")]),
                result: "success".to_string(),
            },
        )]),
        inputs: serde_json::json!({"deploy": false, "environment": "staging"}),
        ..Default::default()
    }
}

#[test]
fn evaluates_expressions_against_pr_context() {
    let cases: &[(&str, &str)] = &[
        // basic expressions
        ("true", "true"),
        ("!true", "false"),
        ("true || false", "true"),
        ("true && false", "false"),
        ("true && false || false", "false"),
        ("true && false || true", "true"),
        ("true || false && true", "true"),
        ("42 > 24", "true"),
        ("42 >= 24", "true"),
        ("42 < 24", "false"),
        ("42 <= 24", "false"),
        ("42", "42"),
        ("'hello'", "\"hello\""),
        ("null", "null"),
        // github context, basic fields
        ("github.actor", "\"octocat\""),
        ("github.actor_id", "\"583231\""),
        ("github.event_name", "\"pull_request\""),
        ("github.repository", "\"octocat/hello-world\""),
        ("github.repository_owner", "\"octocat\""),
        ("github.ref", "\"refs/pull/42/merge\""),
        ("github.ref_name", "\"42/merge\""),
        ("github.base_ref", "\"main\""),
        ("github.head_ref", "\"feature/awesome\""),
        ("github.sha", "\"abc123def456789abc123def456789abc123def4\""),
        ("github.workflow", "\"CI\""),
        ("github.job", "\"build\""),
        ("github.run_id", "\"1234567890\""),
        ("github.run_number", "\"15\""),
        ("github.run_attempt", "\"1\""),
        ("github.server_url", "\"https://github.com\""),
        ("github.api_url", "\"https://api.github.com\""),
        // event payload
        ("github.event.action", "\"opened\""),
        ("github.event.number", "42"),
        ("github.event.pull_request.title", "\"Add new feature\""),
        (
            "github.event.pull_request.body",
            "\"This PR adds a cool new feature\"",
        ),
        ("github.event.pull_request.head.ref", "\"feature/awesome\""),
        ("github.event.pull_request.base.ref", "\"main\""),
        ("github.event.pull_request.user.login", "\"octocat\""),
        ("github.event.pull_request.draft", "false"),
        ("github.event.pull_request.mergeable", "true"),
        (
            "github.event.repository.full_name",
            "\"octocat/hello-world\"",
        ),
        ("github.event.sender.login", "\"octocat\""),
        // env context
        ("env.CI", "\"true\""),
        ("env.NODE_ENV", "\"test\""),
        ("env.LOG_LEVEL", "\"debug\""),
        // job context
        ("job.status", "\"success\""),
        // steps context
        ("steps.checkout.conclusion", "\"success\""),
        ("steps.checkout.outcome", "\"success\""),
        ("steps.setup-node.conclusion", "\"success\""),
        ("steps.setup-node.outputs.node-version", "\"20.10.0\""),
        // runner context
        ("runner.name", "\"GitHub Actions 2\""),
        ("runner.os", "\"Linux\""),
        ("runner.arch", "\"X64\""),
        ("runner.environment", "\"github-hosted\""),
        // vars context
        ("vars.DEPLOYMENT_ENV", "\"staging\""),
        ("vars.APP_NAME", "\"hello-world\""),
        // strategy context
        ("strategy.fail-fast", "true"),
        ("strategy.job-index", "0"),
        ("strategy.job-total", "1"),
        ("strategy.max-parallel", "1"),
        // matrix context
        ("matrix.node-version", "\"20\""),
        ("matrix.os", "\"ubuntu-latest\""),
        // needs context
        ("needs.lint.result", "\"success\""),
        ("needs.lint.outputs.eslint-result", "\"passed\""),
        // inputs context
        ("inputs.deploy", "false"),
        ("inputs.environment", "\"staging\""),
        // comparisons using context values
        ("github.event_name == 'pull_request'", "true"),
        ("github.event_name == 'push'", "false"),
        ("github.actor == 'octocat'", "true"),
        ("job.status == 'success'", "true"),
        ("steps.checkout.conclusion == 'success'", "true"),
        ("github.event.pull_request.draft == false", "true"),
        ("strategy.job-total == 1", "true"),
        ("github.event.number > 40", "true"),
        ("github.event.number >= 42", "true"),
        ("github.event.number < 50", "true"),
        // logical operations with context
        (
            "github.event_name == 'pull_request' && job.status == 'success'",
            "true",
        ),
        (
            "github.event_name == 'push' || github.event_name == 'pull_request'",
            "true",
        ),
        ("!(github.event.pull_request.draft)", "true"),
        (
            "needs.lint.result == 'success' && steps.checkout.conclusion == 'success'",
            "true",
        ),
        // coercing comparisons
        ("'1' == 1", "true"),
        ("null == null", "true"),
        ("null == 0", "true"),
        ("true == 1", "true"),
        ("1 == true", "true"),
        ("false == 0", "true"),
        ("false != 1", "true"),
        // identity comparison of non-empty objects
        ("matrix == matrix", "false"),
        ("'' == false", "true"),
        ("'' == 0", "true"),
        ("'' != 1", "true"),
        ("'' >= 0", "true"),
    ];

    let evaluator = Evaluator::new(&pr_context()).expect("initializing evaluator");

    for (expr, expected) in cases {
        let ast = parser::parse(&format!("{expr} }}}}"))
            .unwrap_or_else(|e| panic!("parsing {expr:?}: {e}"));
        let result = evaluator
            .evaluate(&ast)
            .unwrap_or_else(|e| panic!("evaluating {expr:?}: {e}"));
        let as_json = result.to_json();

        // compare as parsed JSON so formatting differences don't matter
        let got: serde_json::Value =
            serde_json::from_str(&as_json).unwrap_or_else(|e| panic!("marshaling {expr:?}: {e}"));
        let want: serde_json::Value = serde_json::from_str(expected).unwrap();
        assert_eq!(got, want, "expression {expr:?}");
    }
}

#[test]
fn splat_collects_nested_fields() {
    let mut ctx = pr_context();
    ctx.needs.insert(
        "build".to_string(),
        NeedsContext {
            outputs: HashMap::new(),
            result: "success".to_string(),
        },
    );
    let evaluator = Evaluator::new(&ctx).unwrap();

    let ast = parser::parse("needs.*.result }}").unwrap();
    let result = evaluator.evaluate(&ast).unwrap();
    assert_eq!(result.to_json(), "[\"success\",\"success\"]");
}

#[test]
fn template_evaluation_matches_expression_casts() {
    let evaluator = Evaluator::new(&pr_context()).unwrap();
    let rendered = evaluator
        .evaluate_expression(
            "github.event_name == 'pull_request' && job.status == 'success'",
        )
        .unwrap();
    assert_eq!(rendered, "true");

    let rendered = evaluator
        .evaluate_template("ref=${{ github.ref }} n=${{ github.event.number }}")
        .unwrap();
    assert_eq!(rendered, "ref=refs/pull/42/merge n=42");
}

#[test]
fn builtin_functions_work_against_context() {
    let evaluator = Evaluator::new(&pr_context()).unwrap();

    for (expr, expected) in [
        ("contains(github.repository, 'HELLO')", "true"),
        ("startsWith(github.ref, 'refs/pull/')", "true"),
        ("endsWith(github.ref, '/merge')", "true"),
        ("format('{0}-{1}', github.actor, matrix.os)", "octocat-ubuntu-latest"),
        ("join(fromJSON('[\"a\",\"b\"]'), '+')", "a+b"),
        ("fromJSON(toJSON(matrix)).os", "ubuntu-latest"),
    ] {
        let got = evaluator.evaluate_expression(expr).unwrap();
        assert_eq!(got, expected, "expression {expr:?}");
    }
}
