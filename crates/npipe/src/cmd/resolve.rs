use crate::cmd::{Context, ResolveArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_resolved;

pub fn run(args: ResolveArgs, ctx: &Context) -> CliResult<i32> {
    let name = ctx.resolve(&args.pipe)?;
    print_resolved(&name, ctx.format);
    Ok(SUCCESS)
}
