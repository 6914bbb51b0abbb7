use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hookscript::native::NativeInvocation;
use hookscript::{PointCut, Script, Word};

const SUBSTITUTE: &str = "var new_text = \"No, not me!\"\narg0 = &new_text\narg1 = len (new_text)\n";
const REPORT: &str = "send_narrow_string (arg0), send_int32 (arg1), send_byte_array (arg2, arg1)\n";
const FORMAT: &str = "send_narrow_format_string (arg0)\n";

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.bench_function("substitute", |b| b.iter(|| Script::compile(black_box(SUBSTITUTE))));
    group.bench_function("report", |b| b.iter(|| Script::compile(black_box(REPORT))));
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let text = b"The quick brown fox jumps over the lazy dog\0";
    let format = b"%s is %05d bytes long\0";

    let mut group = c.benchmark_group("execute");

    let substitute = Script::compile(SUBSTITUTE).unwrap();
    group.bench_function("substitute", |b| {
        b.iter(|| {
            let mut args: [Word; 2] = [0, 0];
            let mut ret: Word = 0;
            let mut inv = NativeInvocation::new(PointCut::Enter, &mut args, &mut ret);
            substitute.execute(&mut inv).unwrap();
            black_box(inv.into_retained());
        })
    });

    let mut report = Script::compile(REPORT).unwrap();
    report.set_message_handler(|_, msg| {
        black_box(msg);
    });
    group.bench_function("report", |b| {
        b.iter(|| {
            let mut args: [Word; 3] = [text.as_ptr() as Word, 43, text.as_ptr() as Word];
            let mut ret: Word = 0;
            let mut inv = NativeInvocation::new(PointCut::Enter, &mut args, &mut ret);
            report.execute(&mut inv).unwrap();
        })
    });

    let mut formatted = Script::compile(FORMAT).unwrap();
    formatted.set_message_handler(|_, msg| {
        black_box(msg);
    });
    group.bench_function("format", |b| {
        b.iter(|| {
            let mut args: [Word; 3] = [format.as_ptr() as Word, text.as_ptr() as Word, 43];
            let mut ret: Word = 0;
            let mut inv = NativeInvocation::new(PointCut::Enter, &mut args, &mut ret);
            formatted.execute(&mut inv).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
