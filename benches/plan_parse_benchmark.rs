use criterion::{Criterion, black_box, criterion_group, criterion_main};
use web_qa::plan::{TestRun, parse_plan, summarize};

fn sample_plan(steps: usize) -> String {
    let mut plan = String::from("Here is the functional test plan:\n\n");
    for i in 1..=steps {
        plan.push_str(&format!(
            "{}. Click the 'Add Node' button and verify node {} appears in the tree\n",
            i, i
        ));
        if i % 5 == 0 {
            plan.push_str("\nEdge cases:\n");
        }
    }
    plan
}

fn benchmark_parse_plan(c: &mut Criterion) {
    let plan = sample_plan(99);

    c.bench_function("parse_plan_99_steps", |b| {
        b.iter(|| parse_plan(black_box(&plan)))
    });

    let run = TestRun::new(plan.clone(), parse_plan(&plan));
    c.bench_function("summarize_99_steps", |b| {
        b.iter(|| summarize(black_box(&run)))
    });
}

criterion_group!(benches, benchmark_parse_plan);
criterion_main!(benches);
